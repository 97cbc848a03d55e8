use sha2::{Digest, Sha256};

pub const SIGNATURE_HEADER: &str = "X-Upload-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Upload-Timestamp";

/// Per-request authentication attached to every new transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Lowercase hex
    pub signature: String,
    /// Unix seconds, decimal
    pub timestamp: String,
}

impl SignedHeaders {
    /// Header name/value pairs in wire form
    pub fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            (SIGNATURE_HEADER, self.signature.as_str()),
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
        ]
    }
}

/// Produces fresh signed headers. Timestamps are time-sensitive, so this is
/// called right before each new transfer and never cached.
pub trait UploadSigner: Send + Sync {
    fn sign(&self) -> SignedHeaders;
}

impl<T: UploadSigner + ?Sized> UploadSigner for std::sync::Arc<T> {
    fn sign(&self) -> SignedHeaders {
        (**self).sign()
    }
}

/// `hex(sha256(timestamp || secret))`, the scheme the upload endpoint verifies
pub struct Sha256TimestampSigner {
    secret: String,
}

impl Sha256TimestampSigner {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign for an explicit Unix timestamp
    pub fn sign_at(&self, unix_secs: i64) -> SignedHeaders {
        let timestamp = unix_secs.to_string();
        let mut hasher = Sha256::new();
        hasher.update(timestamp.as_bytes());
        hasher.update(self.secret.as_bytes());
        SignedHeaders {
            signature: hex::encode(hasher.finalize()),
            timestamp,
        }
    }
}

impl UploadSigner for Sha256TimestampSigner {
    fn sign(&self) -> SignedHeaders {
        self.sign_at(chrono::Utc::now().timestamp())
    }
}

impl std::fmt::Debug for Sha256TimestampSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha256TimestampSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_sha256_of_timestamp_then_secret() {
        let signer = Sha256TimestampSigner::new("secret");
        let headers = signer.sign_at(1_700_000_000);

        assert_eq!(headers.timestamp, "1700000000");
        let expected = hex::encode(Sha256::digest(b"1700000000secret"));
        assert_eq!(headers.signature, expected);
        assert_eq!(headers.signature.len(), 64);
    }

    #[test]
    fn signing_uses_current_time() {
        let signer = Sha256TimestampSigner::new("secret");
        let before = chrono::Utc::now().timestamp();
        let headers = signer.sign();
        let after = chrono::Utc::now().timestamp();

        let ts: i64 = headers.timestamp.parse().unwrap();
        assert!(ts >= before && ts <= after);
        assert_eq!(headers, signer.sign_at(ts));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let signer = Sha256TimestampSigner::new("hunter2");
        assert!(!format!("{signer:?}").contains("hunter2"));
    }
}
