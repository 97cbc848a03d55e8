use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of a coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Digests with a confirmed remote URL
    pub completed: usize,
    /// Transfers currently running
    pub in_flight: usize,
    /// New transfers started (one per network upload attempt)
    pub transfers_started: u64,
    pub transfers_failed: u64,
    /// Calls answered from the completed cache
    pub cache_hits: u64,
    /// Calls that awaited another caller's transfer
    pub in_flight_joins: u64,
    /// Inputs that went through the downsizer
    pub downsized: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) transfers_started: AtomicU64,
    pub(crate) transfers_failed: AtomicU64,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) in_flight_joins: AtomicU64,
    pub(crate) downsized: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, completed: usize, in_flight: usize) -> CoordinatorStats {
        CoordinatorStats {
            completed,
            in_flight,
            transfers_started: self.transfers_started.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            in_flight_joins: self.in_flight_joins.load(Ordering::Relaxed),
            downsized: self.downsized.load(Ordering::Relaxed),
        }
    }
}
