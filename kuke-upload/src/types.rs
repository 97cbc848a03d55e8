use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::TryStreamExt;
use std::pin::Pin;
use uuid::Uuid;

use crate::{UploadError, UploadResult};

/// Stream of bytes for upload content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file handed to the coordinator by the editor (file picker, paste, drag-drop).
///
/// Lives for the duration of one `resolve_upload` call.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub content_type: String,
    pub filename: String,
    /// Log correlation only
    pub request_id: String,
}

impl UploadRequest {
    pub fn new<B: Into<Bytes>, S: Into<String>>(bytes: B, filename: S) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            filename: filename.into(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Drain `stream` into memory.
    ///
    /// A failing stream is the caller's problem and is reported as
    /// [`UploadError::Read`] rather than masked.
    pub async fn from_stream<S: Into<String>>(stream: ByteStream, filename: S) -> UploadResult<Self> {
        let buf = stream
            .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                buf.extend_from_slice(&chunk);
                Ok(buf)
            })
            .await
            .map_err(|e| UploadError::read(e.to_string()))?;

        Ok(Self::new(buf.freeze(), filename))
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_request_id<S: Into<String>>(mut self, request_id: S) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// `data:` URL of the raw content, for the optimistic placeholder the
    /// editor shows until the remote URL resolves.
    pub fn placeholder_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub(crate) fn into_payload(self) -> TransferPayload {
        TransferPayload {
            bytes: self.bytes,
            filename: self.filename,
            content_type: self.content_type,
        }
    }
}

/// What actually goes over the wire for one new transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPayload {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_embeds_content_type_and_base64_body() {
        let request = UploadRequest::new(&b"hi"[..], "a.png").with_content_type("image/png");
        assert_eq!(request.placeholder_data_url(), "data:image/png;base64,aGk=");
    }

    #[tokio::test]
    async fn from_stream_concatenates_chunks() {
        let chunks = vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));

        let request = UploadRequest::from_stream(stream, "x.bin").await.unwrap();
        assert_eq!(&request.bytes[..], b"abcdef");
        assert_eq!(request.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(request.size_bytes(), 6);
    }

    #[tokio::test]
    async fn from_stream_surfaces_read_failures() {
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone")),
        ];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));

        let err = UploadRequest::from_stream(stream, "x.bin").await.unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }
}
