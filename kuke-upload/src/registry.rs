use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::{ContentDigest, UploadError, UploadResult};

/// Awaitable outcome of one transfer, cloned out to every caller that joins it
pub(crate) type PendingUpload = Shared<BoxFuture<'static, UploadResult<String>>>;

/// Identifies one registered transfer, so a late settle for an old transfer
/// never clears a newer one for the same digest
pub(crate) type Ticket = u64;

/// What a caller gets back from [`UploadRegistry::claim`]
pub(crate) enum Claim {
    /// Already uploaded; no network needed
    Completed(String),
    /// Someone else's transfer for this digest is running
    Joined(PendingUpload),
    /// The caller's `start` closure ran and its transfer is now registered
    Started(PendingUpload),
}

struct InFlight {
    ticket: Ticket,
    pending: PendingUpload,
}

#[derive(Default)]
struct RegistryState {
    /// digest → confirmed remote URL. Never evicted.
    completed: HashMap<ContentDigest, String>,
    /// digest → transfer currently running for it
    in_flight: HashMap<ContentDigest, InFlight>,
    next_ticket: Ticket,
}

/// Completed-upload cache and in-flight registry behind one lock, so that
/// "check both maps, then register a new transfer" is atomic.
///
/// The lock is never held across an await point.
#[derive(Default)]
pub(crate) struct UploadRegistry {
    state: Mutex<RegistryState>,
}

impl UploadRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Look `digest` up in both maps; if it is unseen, call `start` with a
    /// fresh ticket while still holding the lock and register what it returns.
    ///
    /// `start` must not settle synchronously; it runs under the lock.
    pub(crate) fn claim<F>(&self, digest: &ContentDigest, start: F) -> Claim
    where
        F: FnOnce(Ticket) -> PendingUpload,
    {
        let mut state = self.state.lock();

        if let Some(url) = state.completed.get(digest) {
            return Claim::Completed(url.clone());
        }
        if let Some(entry) = state.in_flight.get(digest) {
            return Claim::Joined(entry.pending.clone());
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let pending = start(ticket);
        state.in_flight.insert(
            *digest,
            InFlight {
                ticket,
                pending: pending.clone(),
            },
        );
        Claim::Started(pending)
    }

    /// Record the outcome of transfer `ticket` for `digest`: its in-flight
    /// entry goes away, and only a success is remembered. Settling the same
    /// ticket twice is harmless.
    pub(crate) fn settle(&self, digest: &ContentDigest, ticket: Ticket, outcome: &UploadResult<String>) {
        let mut state = self.state.lock();
        if state.in_flight.get(digest).is_some_and(|entry| entry.ticket == ticket) {
            state.in_flight.remove(digest);
        }
        if let Ok(url) = outcome {
            state.completed.insert(*digest, url.clone());
        }
    }

    pub(crate) fn completed_url(&self, digest: &ContentDigest) -> Option<String> {
        self.state.lock().completed.get(digest).cloned()
    }

    pub(crate) fn is_in_flight(&self, digest: &ContentDigest) -> bool {
        self.state.lock().in_flight.contains_key(digest)
    }

    /// (completed entries, in-flight entries)
    pub(crate) fn sizes(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.completed.len(), state.in_flight.len())
    }
}

/// Settles one transfer. If it is dropped unsettled (the task panicked or
/// was cancelled) the transfer is settled as failed, returning the digest
/// to unseen.
pub(crate) struct SettleGuard {
    registry: Arc<UploadRegistry>,
    digest: ContentDigest,
    ticket: Ticket,
    settled: bool,
}

impl SettleGuard {
    pub(crate) fn new(registry: Arc<UploadRegistry>, digest: ContentDigest, ticket: Ticket) -> Self {
        Self {
            registry,
            digest,
            ticket,
            settled: false,
        }
    }

    pub(crate) fn settle(mut self, outcome: &UploadResult<String>) {
        self.registry.settle(&self.digest, self.ticket, outcome);
        self.settled = true;
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.settle(
                &self.digest,
                self.ticket,
                &Err(UploadError::transfer("upload task ended before completing")),
            );
        }
    }
}
