//! Per-key exponential retry delays.

use crate::store::ObjectKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Smallest retry delay handed out.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Tracks consecutive failures per key and turns them into retry delays.
///
/// The n-th consecutive failure waits `base * 2^(n-1)`, capped at `max`.
/// `base` is never below [`MIN_DELAY`].
#[derive(Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl ExponentialBackoff {
    /// Create a backoff policy.
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(MIN_DELAY);
        Self {
            base,
            max: max.max(base),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying.
    pub fn next_delay(&self, key: &ObjectKey) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.clone()).or_insert(0);
        let delay = 2u32
            .checked_pow(*count)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max));
        *count = count.saturating_add(1);
        delay
    }

    /// Upper bound for any delay.
    pub fn max_delay(&self) -> Duration {
        self.max
    }

    /// Clear the failure history of `key` after a success.
    pub fn forget(&self, key: &ObjectKey) {
        self.failures.lock().remove(key);
    }

    /// Consecutive failures recorded for `key`.
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}
