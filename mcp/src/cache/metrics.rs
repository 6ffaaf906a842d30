//! Counters for cache activity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::status::RefreshOutcome;

/// Metrics for refresh cycles and on-demand fetches.
pub struct CacheMetrics {
    // Refresh metrics
    refreshes_started: AtomicU64,
    refreshes_succeeded: AtomicU64,
    refreshes_partial: AtomicU64,
    refreshes_failed: AtomicU64,
    refreshes_skipped: AtomicU64,

    // On-demand metrics
    on_demand_fetches: AtomicU64,
    on_demand_failures: AtomicU64,
    backoff_rejections: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            refreshes_started: AtomicU64::new(0),
            refreshes_succeeded: AtomicU64::new(0),
            refreshes_partial: AtomicU64::new(0),
            refreshes_failed: AtomicU64::new(0),
            refreshes_skipped: AtomicU64::new(0),
            on_demand_fetches: AtomicU64::new(0),
            on_demand_failures: AtomicU64::new(0),
            backoff_rejections: AtomicU64::new(0),
        }
    }

    pub fn record_refresh_started(&self) {
        self.refreshes_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how a refresh cycle ended.
    pub fn record_refresh_outcome(&self, outcome: &RefreshOutcome) {
        let counter = match outcome {
            RefreshOutcome::Success(_) => &self.refreshes_succeeded,
            RefreshOutcome::Partial(_) => &self.refreshes_partial,
            RefreshOutcome::Failed(_) => &self.refreshes_failed,
            RefreshOutcome::Skipped => &self.refreshes_skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_on_demand_fetch(&self) {
        self.on_demand_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_on_demand_failure(&self) {
        self.on_demand_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backoff_rejection(&self) {
        self.backoff_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            refreshes_started: self.refreshes_started.load(Ordering::Relaxed),
            refreshes_succeeded: self.refreshes_succeeded.load(Ordering::Relaxed),
            refreshes_partial: self.refreshes_partial.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
            on_demand_fetches: self.on_demand_fetches.load(Ordering::Relaxed),
            on_demand_failures: self.on_demand_failures.load(Ordering::Relaxed),
            backoff_rejections: self.backoff_rejections.load(Ordering::Relaxed),
        }
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetricsSnapshot {
    pub refreshes_started: u64,
    pub refreshes_succeeded: u64,
    pub refreshes_partial: u64,
    pub refreshes_failed: u64,
    pub refreshes_skipped: u64,
    pub on_demand_fetches: u64,
    pub on_demand_failures: u64,
    pub backoff_rejections: u64,
}
