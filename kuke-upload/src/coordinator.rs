use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, field, info, info_span, instrument, warn, Instrument, Span};

use crate::registry::{Claim, PendingUpload, SettleGuard, Ticket, UploadRegistry};
use crate::stats::Counters;
use crate::{
    ContentDigest, CoordinatorStats, DownsizePolicy, ImageDownsizer, JpegDownsizer, RemoteTransfer,
    UploadConfig, UploadError, UploadRequest, UploadResult, UploadSigner,
};

/// Resolves editor attachments to remote URLs, uploading each distinct
/// content at most once.
///
/// One coordinator per editor instance. Its completed-upload cache and
/// in-flight registry live exactly as long as it does and are never shared
/// with other coordinators.
///
/// Must be used from within a tokio runtime: transfers run as spawned tasks
/// so that they finish (and populate the cache) even if every caller stops
/// waiting.
pub struct UploadCoordinator {
    transfer: Arc<dyn RemoteTransfer>,
    signer: Arc<dyn UploadSigner>,
    downsizer: Arc<dyn ImageDownsizer>,
    config: UploadConfig,
    registry: Arc<UploadRegistry>,
    counters: Arc<Counters>,
}

impl UploadCoordinator {
    pub fn new<T, S>(transfer: T, signer: S, config: UploadConfig) -> Self
    where
        T: RemoteTransfer + 'static,
        S: UploadSigner + 'static,
    {
        Self {
            transfer: Arc::new(transfer),
            signer: Arc::new(signer),
            downsizer: Arc::new(JpegDownsizer),
            config,
            registry: Arc::new(UploadRegistry::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Replace the default JPEG downsizer
    pub fn with_downsizer<D: ImageDownsizer + 'static>(mut self, downsizer: D) -> Self {
        self.downsizer = Arc::new(downsizer);
        self
    }

    /// Resolve `request` to the remote URL of its content.
    ///
    /// 1. Oversized input is downsized first; a downsize failure aborts the call.
    /// 2. The (possibly downsized) bytes are digested.
    /// 3. A completed upload of the same digest is returned without network I/O.
    /// 4. A running transfer of the same digest is joined.
    /// 5. Otherwise a new transfer starts, with freshly signed headers.
    ///
    /// Every caller for one digest sees the same outcome. Failures are not
    /// cached, so a later call with the same content tries again.
    #[instrument(
        name = "resolve_upload",
        skip(self, request),
        fields(
            request_id = %request.request_id,
            filename = %request.filename,
            size = request.bytes.len(),
            digest = field::Empty,
        )
    )]
    pub async fn resolve_upload(&self, request: UploadRequest) -> UploadResult<String> {
        let request = if self.config.needs_downsize(request.size_bytes()) {
            Counters::bump(&self.counters.downsized);
            let policy = DownsizePolicy::from(&self.config);
            self.downsizer.downsize(request, policy).await.map_err(|e| {
                warn!(error = %e, "downsize failed, upload aborted");
                e
            })?
        } else {
            request
        };

        let digest = ContentDigest::of(&request.bytes);
        Span::current().record("digest", field::display(&digest));

        match self.registry.claim(&digest, |ticket| self.start_transfer(digest, ticket, request)) {
            Claim::Completed(url) => {
                Counters::bump(&self.counters.cache_hits);
                debug!(%url, "served from upload cache");
                Ok(url)
            }
            Claim::Joined(pending) => {
                Counters::bump(&self.counters.in_flight_joins);
                debug!("joining in-flight upload");
                pending.await
            }
            Claim::Started(pending) => pending.await,
        }
    }

    /// Spawn the transfer for `digest`. Runs under the registry lock, so it
    /// must not block, await or settle.
    fn start_transfer(&self, digest: ContentDigest, ticket: Ticket, request: UploadRequest) -> PendingUpload {
        Counters::bump(&self.counters.transfers_started);

        let transfer = Arc::clone(&self.transfer);
        let signer = Arc::clone(&self.signer);
        let registry = Arc::clone(&self.registry);
        let counters = Arc::clone(&self.counters);
        let payload = request.into_payload();

        let task_registry = Arc::clone(&registry);
        let task = async move {
            // built on first poll, never inside `claim`
            let guard = SettleGuard::new(task_registry, digest, ticket);
            let outcome = AssertUnwindSafe(async move {
                // signed per attempt, never reused
                let headers = signer.sign();
                transfer.transfer(payload, headers).await
            })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(UploadError::transfer("upload collaborator panicked")));

            match &outcome {
                Ok(url) => info!(%url, "upload completed"),
                Err(e) => {
                    Counters::bump(&counters.transfers_failed);
                    warn!(error = %e, "upload failed");
                }
            }
            guard.settle(&outcome);
            outcome
        }
        .instrument(info_span!("upload_transfer", %digest));

        let handle = tokio::spawn(task);
        async move {
            handle.await.unwrap_or_else(|e| {
                // a task cancelled before its first poll never built its guard
                let outcome = Err(UploadError::transfer(format!("upload task aborted: {e}")));
                registry.settle(&digest, ticket, &outcome);
                outcome
            })
        }
        .boxed()
        .shared()
    }

    /// URL of a completed upload of `digest`, if any
    pub fn cached_url(&self, digest: &ContentDigest) -> Option<String> {
        self.registry.completed_url(digest)
    }

    pub fn is_in_flight(&self, digest: &ContentDigest) -> bool {
        self.registry.is_in_flight(digest)
    }

    pub fn stats(&self) -> CoordinatorStats {
        let (completed, in_flight) = self.registry.sizes();
        self.counters.snapshot(completed, in_flight)
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
