//! `RemoteTransfer` over the REST API's multipart image endpoint.

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{RemoteTransfer, SignedHeaders, TransferConfig, TransferPayload, UploadError, UploadResult};

/// Multipart field the endpoint reads the file from
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: serde_json::Value,
}

/// Posts payloads as `multipart/form-data` and reads `{"url": ...}` back.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: Client,
    config: TransferConfig,
}

impl HttpTransfer {
    pub fn new(config: TransferConfig) -> UploadResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UploadError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Use a preconfigured client. Its own timeout applies instead of `config.timeout`.
    pub fn with_client(client: Client, config: TransferConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }
}

#[async_trait]
impl RemoteTransfer for HttpTransfer {
    async fn transfer(&self, payload: TransferPayload, headers: SignedHeaders) -> UploadResult<String> {
        let url = self.config.upload_url();
        let size = payload.bytes.len();

        let part = multipart::Part::stream_with_length(payload.bytes, size as u64)
            .file_name(payload.filename)
            .mime_str(&payload.content_type)
            .map_err(|e| UploadError::transfer(format!("invalid content type: {e}")))?;
        let form = multipart::Form::new().part(FILE_FIELD, part);

        let mut request = self.client.post(&url).multipart(form);
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        debug!(%url, size, "sending upload");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let reason = rejection_reason(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            warn!(status = status.as_u16(), %reason, "upload rejected");
            return Err(UploadError::rejected(status.as_u16(), reason));
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| UploadError::transfer(format!("malformed upload response: {e}")))?;
        if parsed.url.is_empty() {
            return Err(UploadError::transfer("upload response has an empty url"));
        }
        Ok(parsed.url)
    }
}

/// The API's `detail` field when present, else the raw body.
fn rejection_reason(body: &str) -> Option<String> {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return Some(match err.detail {
            serde_json::Value::String(detail) => detail,
            other => other.to_string(),
        });
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
