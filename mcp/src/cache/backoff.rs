//! Per-project failure tracking for on-demand fetches.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct FailureState {
    failures: u32,
    retry_at: Instant,
}

/// Refuses on-demand fetches for a key until its backoff window has passed.
///
/// After the n-th consecutive failure the window is
/// `min(base * 2^(n-1), max)`. A success clears the key.
pub struct FailureBackoff {
    base_delay: Duration,
    max_delay: Duration,
    state: DashMap<String, FailureState>,
}

impl FailureBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            state: DashMap::new(),
        }
    }

    /// delay = min(base_delay * 2^(failures-1), max_delay)
    pub fn calculate_backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = failures.saturating_sub(1).min(63);
        let factor = 2u64.saturating_pow(exponent);
        let delay = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay.as_millis() as u64))
    }

    /// Remaining wait for `key`, or `None` if a fetch may proceed.
    pub fn check(&self, key: &str) -> Option<Duration> {
        let entry = self.state.get(key)?;
        let now = Instant::now();
        if entry.retry_at > now {
            Some(entry.retry_at - now)
        } else {
            None
        }
    }

    /// Record a failure and return the new window.
    pub fn record_failure(&self, key: &str) -> Duration {
        let mut entry = self.state.entry(key.to_string()).or_insert(FailureState {
            failures: 0,
            retry_at: Instant::now(),
        });
        entry.failures = entry.failures.saturating_add(1);
        let delay = self.calculate_backoff(entry.failures);
        entry.retry_at = Instant::now() + delay;
        delay
    }

    pub fn record_success(&self, key: &str) {
        self.state.remove(key);
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.state.get(key).map_or(0, |s| s.failures)
    }

    pub fn clear(&self) {
        self.state.clear();
    }
}
