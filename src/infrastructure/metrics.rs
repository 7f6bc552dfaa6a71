//! Metrics collection for router monitoring
//!
//! Lock-free counters using atomic operations.
//! Bumped from the routing tasks, exported via API in cold path.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Router metrics collector
///
/// Shared by both routers. Snapshots taken for API export.
pub struct MetricsCollector {
    /// Messages forwarded from the ingress queue to a lane
    routed: AtomicU64,
    /// Messages dropped because their pair has no lane
    dropped_untracked: AtomicU64,
    /// Init/Flash messages pushed by producers and ignored by lanes
    ignored_kind: AtomicU64,
    /// Trade updates emitted
    trades: AtomicU64,
    /// Ticker updates emitted
    tickers: AtomicU64,
    /// Synthetic Flash updates emitted
    flashes: AtomicU64,
    /// Timer firings discarded by the last-trade check
    stale_firings: AtomicU64,
    /// Trades forwarded by the history router
    history_forwarded: AtomicU64,
    /// History trades dropped for belonging to another pair
    history_other_pair: AtomicU64,
    /// History trades dropped for being at or below the high-water mark
    history_stale: AtomicU64,
    /// Highlight clears emitted by the history router
    highlight_clears: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for API export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub routed: u64,
    pub dropped_untracked: u64,
    pub ignored_kind: u64,
    pub trades: u64,
    pub tickers: u64,
    pub flashes: u64,
    pub stale_firings: u64,
    pub history_forwarded: u64,
    pub history_other_pair: u64,
    pub history_stale: u64,
    pub highlight_clears: u64,
    pub uptime_seconds: u64,
}

impl MetricsCollector {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            routed: AtomicU64::new(0),
            dropped_untracked: AtomicU64::new(0),
            ignored_kind: AtomicU64::new(0),
            trades: AtomicU64::new(0),
            tickers: AtomicU64::new(0),
            flashes: AtomicU64::new(0),
            stale_firings: AtomicU64::new(0),
            history_forwarded: AtomicU64::new(0),
            history_other_pair: AtomicU64::new(0),
            history_stale: AtomicU64::new(0),
            highlight_clears: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_routed(&self) {
        self.routed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_untracked(&self) {
        self.dropped_untracked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ignored_kind(&self) {
        self.ignored_kind.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trade(&self) {
        self.trades.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ticker(&self) {
        self.tickers.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flash(&self) {
        self.flashes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_firing(&self) {
        self.stale_firings.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_history_forwarded(&self) {
        self.history_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_history_other_pair(&self) {
        self.history_other_pair.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_history_stale(&self) {
        self.history_stale.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_highlight_clear(&self) {
        self.highlight_clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            routed: self.routed.load(Ordering::Relaxed),
            dropped_untracked: self.dropped_untracked.load(Ordering::Relaxed),
            ignored_kind: self.ignored_kind.load(Ordering::Relaxed),
            trades: self.trades.load(Ordering::Relaxed),
            tickers: self.tickers.load(Ordering::Relaxed),
            flashes: self.flashes.load(Ordering::Relaxed),
            stale_firings: self.stale_firings.load(Ordering::Relaxed),
            history_forwarded: self.history_forwarded.load(Ordering::Relaxed),
            history_other_pair: self.history_other_pair.load(Ordering::Relaxed),
            history_stale: self.history_stale.load(Ordering::Relaxed),
            highlight_clears: self.highlight_clears.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
