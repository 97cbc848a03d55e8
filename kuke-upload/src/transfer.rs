use async_trait::async_trait;

use crate::{SignedHeaders, TransferPayload, UploadResult};

/// The remote store that turns a payload into a public URL.
///
/// Timeouts belong to the implementation; they must surface as
/// [`crate::UploadError::Transfer`] with `timed_out` set.
#[async_trait]
pub trait RemoteTransfer: Send + Sync {
    /// Send `payload` with the given signed headers and return its public URL
    async fn transfer(&self, payload: TransferPayload, headers: SignedHeaders) -> UploadResult<String>;
}

#[async_trait]
impl<T: RemoteTransfer + ?Sized> RemoteTransfer for std::sync::Arc<T> {
    async fn transfer(&self, payload: TransferPayload, headers: SignedHeaders) -> UploadResult<String> {
        (**self).transfer(payload, headers).await
    }
}
