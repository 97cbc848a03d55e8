use std::collections::HashMap;
use std::time::Duration;

use crate::{UploadError, UploadResult};

/// Prefix for environment overrides: `KUKE__UPLOAD__MAX_DIMENSION_PX` → `upload.max_dimension_px`
pub const ENV_PREFIX: &str = "KUKE__";

/// Policy for the upload coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Inputs strictly larger than this are downsized before hashing
    pub downsize_threshold_bytes: u64,

    /// Neither edge of a downsized image exceeds this
    pub max_dimension_px: u32,

    /// JPEG quality (1-100) used when re-encoding
    pub jpeg_quality: u8,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            downsize_threshold_bytes: 5 * 1024 * 1024, // 5MiB
            max_dimension_px: 1920,
            jpeg_quality: 80,
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the downsize threshold
    pub fn with_downsize_threshold(mut self, bytes: u64) -> Self {
        self.downsize_threshold_bytes = bytes;
        self
    }

    /// Set the maximum edge length for downsized images
    pub fn with_max_dimension(mut self, px: u32) -> Self {
        self.max_dimension_px = px;
        self
    }

    /// Set the re-encode quality, clamped to 1..=100
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Whether a payload of `size_bytes` must go through the downsizer
    pub fn needs_downsize(&self, size_bytes: u64) -> bool {
        size_bytes > self.downsize_threshold_bytes
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> UploadResult<Self> {
        Self::from_settings(&EnvSettings::from_vars(std::env::vars()))
    }

    pub(crate) fn from_settings(settings: &EnvSettings) -> UploadResult<Self> {
        let mut config = Self::default();
        if let Some(bytes) = settings.parse::<u64>("upload.downsize_threshold_bytes")? {
            config.downsize_threshold_bytes = bytes;
        }
        if let Some(px) = settings.parse::<u32>("upload.max_dimension_px")? {
            if px == 0 {
                return Err(UploadError::config("upload.max_dimension_px must be positive"));
            }
            config.max_dimension_px = px;
        }
        if let Some(quality) = settings.parse::<u8>("upload.jpeg_quality")? {
            config = config.with_jpeg_quality(quality);
        }
        Ok(config)
    }
}

/// Where and how payloads are sent to the remote upload endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Base URL of the REST API
    pub api_base: String,

    /// Path of the image upload endpoint, appended to `api_base`
    pub upload_path: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Sent as `Authorization: Bearer <token>` when present
    pub bearer_token: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.kuke.ink".to_string(),
            upload_path: "/api/upload/image".to_string(),
            timeout: Duration::from_secs(60),
            bearer_token: None,
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_upload_path<S: Into<String>>(mut self, path: S) -> Self {
        self.upload_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_bearer_token<S: Into<String>>(mut self, token: S) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Full URL of the upload endpoint
    pub fn upload_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        if self.upload_path.starts_with('/') {
            format!("{}{}", base, self.upload_path)
        } else {
            format!("{}/{}", base, self.upload_path)
        }
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> UploadResult<Self> {
        Self::from_settings(&EnvSettings::from_vars(std::env::vars()))
    }

    pub(crate) fn from_settings(settings: &EnvSettings) -> UploadResult<Self> {
        let mut config = Self::default();
        if let Some(base) = settings.get("api.base") {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(UploadError::config(format!(
                    "api.base must be an http(s) URL, got {base:?}"
                )));
            }
            config.api_base = base.to_string();
        }
        if let Some(path) = settings.get("api.upload_path") {
            config.upload_path = path.to_string();
        }
        if let Some(secs) = settings.parse::<u64>("api.timeout_secs")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(token) = settings.get("api.token").filter(|t| !t.is_empty()) {
            config.bearer_token = Some(token.to_string());
        }
        Ok(config)
    }
}

/// Shared secret for the upload signer, read from `KUKE__UPLOAD__SECRET`
pub fn upload_secret_from_env() -> Option<String> {
    EnvSettings::from_vars(std::env::vars())
        .get("upload.secret")
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Environment variables under [`ENV_PREFIX`], keyed by their normalized dotted name.
#[derive(Debug, Default, Clone)]
pub(crate) struct EnvSettings {
    values: HashMap<String, String>,
}

impl EnvSettings {
    pub(crate) fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let values = vars
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|stripped| (stripped.to_lowercase().replace("__", "."), value))
            })
            .collect();
        Self { values }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    fn parse<T>(&self, key: &str) -> UploadResult<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                UploadError::config(format!("{key}: cannot parse {raw:?}: {e}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> EnvSettings {
        EnvSettings::from_vars(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn defaults_match_upload_policy() {
        let config = UploadConfig::default();
        assert_eq!(config.downsize_threshold_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_dimension_px, 1920);
        assert_eq!(config.jpeg_quality, 80);
        assert!(!config.needs_downsize(5 * 1024 * 1024));
        assert!(config.needs_downsize(5 * 1024 * 1024 + 1));
    }

    #[test]
    fn env_overrides_are_applied() {
        let s = settings(&[
            ("KUKE__UPLOAD__MAX_DIMENSION_PX", "1024"),
            ("KUKE__UPLOAD__JPEG_QUALITY", "250"),
            ("KUKE__API__BASE", "http://localhost:8000/"),
            ("KUKE__API__TIMEOUT_SECS", "5"),
            ("KUKE__API__TOKEN", "abc"),
            ("UNRELATED", "1"),
        ]);

        let upload = UploadConfig::from_settings(&s).unwrap();
        assert_eq!(upload.max_dimension_px, 1024);
        assert_eq!(upload.jpeg_quality, 100);
        assert_eq!(upload.downsize_threshold_bytes, 5 * 1024 * 1024);

        let transfer = TransferConfig::from_settings(&s).unwrap();
        assert_eq!(transfer.upload_url(), "http://localhost:8000/api/upload/image");
        assert_eq!(transfer.timeout, Duration::from_secs(5));
        assert_eq!(transfer.bearer_token.as_deref(), Some("abc"));
    }

    #[test]
    fn unparseable_values_are_config_errors() {
        let s = settings(&[("KUKE__UPLOAD__DOWNSIZE_THRESHOLD_BYTES", "five")]);
        let err = UploadConfig::from_settings(&s).unwrap_err();
        assert!(matches!(err, UploadError::Config { .. }));

        let s = settings(&[("KUKE__API__BASE", "ftp://example")]);
        assert!(TransferConfig::from_settings(&s).is_err());

        let s = settings(&[("KUKE__UPLOAD__MAX_DIMENSION_PX", "0")]);
        assert!(UploadConfig::from_settings(&s).is_err());
    }

    #[test]
    fn upload_url_joins_relative_paths() {
        let config = TransferConfig::new()
            .with_api_base("https://cdn.example")
            .with_upload_path("upload");
        assert_eq!(config.upload_url(), "https://cdn.example/upload");
    }
}
