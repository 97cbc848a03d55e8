//! # kuke-upload: content-addressed image uploads for the Kuke editors
//!
//! `kuke-upload` turns an image the user pasted, dropped or picked into a
//! public URL on the Kuke API, while making sure each distinct image is sent
//! over the network at most once.
//!
//! ## Key Features
//!
//! - **Content-addressed cache**: uploads are keyed by the SHA-256 of the bytes
//!   actually sent; a repeat of the same content resolves instantly
//! - **In-flight de-duplication**: concurrent requests for the same content
//!   share a single transfer and all receive the same outcome
//! - **Automatic downsizing**: images over 5 MiB are scaled to fit 1920 px and
//!   re-encoded as JPEG before hashing and transfer
//! - **No negative caching**: a failed transfer leaves nothing behind, so the
//!   user can simply retry
//! - **Pluggable collaborators**: the transfer, the request signer and the
//!   downsizer are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use kuke_upload::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> UploadResult<()> {
//! let transfer = HttpTransfer::new(TransferConfig::from_env()?)?;
//! let signer = Sha256TimestampSigner::new("shared-upload-secret");
//! let uploads = UploadCoordinator::new(transfer, signer, UploadConfig::default());
//!
//! let bytes = std::fs::read("screenshot.png").expect("readable file");
//! let request = UploadRequest::new(bytes, "screenshot.png").with_content_type("image/png");
//!
//! // show `request.placeholder_data_url()` while this resolves
//! let url = uploads.resolve_upload(request).await?;
//! println!("{url}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    Editor / CLI     │  ← supplies files, patches placeholders
//! ├─────────────────────┤
//! │  UploadCoordinator  │  ← downsize → digest → cache / in-flight / transfer
//! ├─────────────────────┤
//! │ RemoteTransfer      │  ← HttpTransfer (multipart POST) or your own
//! │ UploadSigner        │  ← Sha256TimestampSigner
//! │ ImageDownsizer      │  ← JpegDownsizer
//! └─────────────────────┘
//! ```
//!
//! Per digest the coordinator moves `Unseen → InFlight → Completed`, or back
//! to `Unseen` when the transfer fails.

pub mod config;
mod coordinator;
mod digest;
pub mod downsize;
mod error;
pub mod http;
mod registry;
pub mod signing;
mod stats;
mod transfer;
mod types;

// Re-export main types for clean API
pub use config::{TransferConfig, UploadConfig};
pub use coordinator::UploadCoordinator;
pub use digest::{digest, ContentDigest};
pub use downsize::{DownsizePolicy, ImageDownsizer, JpegDownsizer};
pub use error::{UploadError, UploadResult};
pub use http::HttpTransfer;
pub use signing::{Sha256TimestampSigner, SignedHeaders, UploadSigner};
pub use stats::CoordinatorStats;
pub use transfer::RemoteTransfer;
pub use types::{ByteStream, TransferPayload, UploadRequest};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        HttpTransfer, RemoteTransfer, Sha256TimestampSigner, TransferConfig, UploadConfig,
        UploadCoordinator, UploadError, UploadRequest, UploadResult, UploadSigner,
    };
}
