use thiserror::Error;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that can occur while resolving an upload.
///
/// `Clone` because a single transfer outcome is handed to every caller that
/// joined the same in-flight upload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Image downsize failed: {reason}")]
    Downsize { reason: String },

    #[error("Upload transfer failed{}: {reason}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transfer {
        reason: String,
        status: Option<u16>,
        timed_out: bool,
    },

    #[error("Failed to read upload content: {reason}")]
    Read { reason: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl UploadError {
    /// Create a downsize error
    pub fn downsize<S: Into<String>>(reason: S) -> Self {
        Self::Downsize {
            reason: reason.into(),
        }
    }

    /// Create a transfer error with no remote status (network failure, bad body, ...)
    pub fn transfer<S: Into<String>>(reason: S) -> Self {
        Self::Transfer {
            reason: reason.into(),
            status: None,
            timed_out: false,
        }
    }

    /// Create a transfer error for a non-success response from the remote service
    pub fn rejected<S: Into<String>>(status: u16, reason: S) -> Self {
        Self::Transfer {
            reason: reason.into(),
            status: Some(status),
            timed_out: false,
        }
    }

    /// Create a transfer error for a request that hit the collaborator's timeout
    pub fn timeout<S: Into<String>>(reason: S) -> Self {
        Self::Transfer {
            reason: reason.into(),
            status: None,
            timed_out: true,
        }
    }

    /// Create a read error
    pub fn read<S: Into<String>>(reason: S) -> Self {
        Self::Read {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn is_downsize(&self) -> bool {
        matches!(self, Self::Downsize { .. })
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transfer { timed_out: true, .. })
    }

    /// HTTP status reported by the remote service, if the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transfer { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else {
            match err.status() {
                Some(status) => Self::rejected(status.as_u16(), err.to_string()),
                None => Self::transfer(err.to_string()),
            }
        }
    }
}

impl From<image::ImageError> for UploadError {
    fn from(err: image::ImageError) -> Self {
        Self::downsize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_error_mentions_status_and_reason() {
        let err = UploadError::rejected(413, "file too large");
        assert_eq!(err.to_string(), "Upload transfer failed (HTTP 413): file too large");
        assert_eq!(err.status(), Some(413));
        assert!(err.is_transfer());
        assert!(!err.is_timeout());
    }

    #[test]
    fn timeout_is_a_transfer_error() {
        let err = UploadError::timeout("operation timed out");
        assert!(err.is_transfer());
        assert!(err.is_timeout());
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "Upload transfer failed: operation timed out");
    }

    #[test]
    fn image_errors_become_downsize_errors() {
        let err: UploadError = image::load_from_memory(b"not an image").unwrap_err().into();
        assert!(err.is_downsize());
    }
}
