//! Cache operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache operations.
///
/// All counters are atomic and can be read from any thread.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Snapshot installs.
    snapshots_set: AtomicU64,
    /// Snapshot clears.
    snapshots_cleared: AtomicU64,
    /// Watches registered (SOTW and delta).
    watches_opened: AtomicU64,
    /// Watches removed via their cancel handle.
    watches_cancelled: AtomicU64,
    /// State-of-the-world responses handed to sinks.
    responses_sent: AtomicU64,
    /// Delta responses handed to sinks.
    delta_responses_sent: AtomicU64,
    /// Heartbeat responses handed to sinks.
    heartbeats_sent: AtomicU64,
    /// Fetches answered with a response.
    fetches_served: AtomicU64,
    /// Fetches skipped because the client was up to date.
    fetches_skipped: AtomicU64,
}

impl CacheStats {
    /// Create new cache statistics.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_set(&self) {
        self.snapshots_set.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_clear(&self) {
        self.snapshots_cleared.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_watch_opened(&self) {
        self.watches_opened.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_watch_cancelled(&self) {
        self.watches_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_response(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_delta_response(&self) {
        self.delta_responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_heartbeat(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_fetch_served(&self) {
        self.fetches_served.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_fetch_skipped(&self) {
        self.fetches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Total snapshot installs.
    #[inline]
    pub fn snapshots_set(&self) -> u64 {
        self.snapshots_set.load(Ordering::Relaxed)
    }

    /// Total snapshot clears.
    #[inline]
    pub fn snapshots_cleared(&self) -> u64 {
        self.snapshots_cleared.load(Ordering::Relaxed)
    }

    /// Total watches registered.
    #[inline]
    pub fn watches_opened(&self) -> u64 {
        self.watches_opened.load(Ordering::Relaxed)
    }

    /// Total watches cancelled.
    #[inline]
    pub fn watches_cancelled(&self) -> u64 {
        self.watches_cancelled.load(Ordering::Relaxed)
    }

    /// Total state-of-the-world responses sent.
    #[inline]
    pub fn responses_sent(&self) -> u64 {
        self.responses_sent.load(Ordering::Relaxed)
    }

    /// Total delta responses sent.
    #[inline]
    pub fn delta_responses_sent(&self) -> u64 {
        self.delta_responses_sent.load(Ordering::Relaxed)
    }

    /// Total heartbeat responses sent.
    #[inline]
    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent.load(Ordering::Relaxed)
    }

    /// Total fetches answered with a response.
    #[inline]
    pub fn fetches_served(&self) -> u64 {
        self.fetches_served.load(Ordering::Relaxed)
    }

    /// Total fetches skipped as up to date.
    #[inline]
    pub fn fetches_skipped(&self) -> u64 {
        self.fetches_skipped.load(Ordering::Relaxed)
    }
}
