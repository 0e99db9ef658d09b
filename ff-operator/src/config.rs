//! Operator configuration.

use crate::runtime::MIN_DELAY;
use std::time::Duration;

/// Runtime configuration for the controller.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace to watch. `None` watches all namespaces.
    pub namespace: Option<String>,
    /// Number of concurrent reconcile workers.
    pub workers: usize,
    /// Deadline for a single store call.
    pub store_timeout: Duration,
    /// Interval at which every known FeatureFlag is re-enqueued.
    pub resync_interval: Option<Duration>,
    /// When set, successful reconciles ask to run again after this delay.
    pub requeue_after: Option<Duration>,
    /// First retry delay after a failed reconcile.
    pub backoff_base: Duration,
    /// Upper bound for retry delays.
    pub backoff_max: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            workers: 4,
            store_timeout: Duration::from_secs(10),
            resync_interval: None,
            requeue_after: None,
            backoff_base: Duration::from_millis(5),
            backoff_max: Duration::from_secs(300),
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok())
}

/// Zero disables the interval.
fn env_interval_secs(name: &str) -> Option<Duration> {
    env_u64(name)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

impl OperatorConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `FF_OPERATOR_NAMESPACE`: Namespace to watch (all when unset)
    /// - `FF_OPERATOR_WORKERS`: Concurrent reconcile workers
    /// - `FF_OPERATOR_STORE_TIMEOUT_MS`: Deadline per API call
    /// - `FF_OPERATOR_RESYNC_SECS`: Periodic resync interval, 0 disables
    /// - `FF_OPERATOR_REQUEUE_SECS`: Requeue after success, 0 disables
    /// - `FF_OPERATOR_BACKOFF_BASE_MS`: First retry delay
    /// - `FF_OPERATOR_BACKOFF_MAX_SECS`: Retry delay cap
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let namespace = std::env::var("FF_OPERATOR_NAMESPACE")
            .ok()
            .filter(|ns| !ns.is_empty());

        let workers = env_u64("FF_OPERATOR_WORKERS")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(defaults.workers);

        let store_timeout = env_u64("FF_OPERATOR_STORE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout);

        let backoff_base = env_u64("FF_OPERATOR_BACKOFF_BASE_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff_base);

        let backoff_max = env_u64("FF_OPERATOR_BACKOFF_MAX_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.backoff_max);

        Self {
            namespace,
            store_timeout,
            resync_interval: env_interval_secs("FF_OPERATOR_RESYNC_SECS"),
            requeue_after: env_interval_secs("FF_OPERATOR_REQUEUE_SECS"),
            ..defaults
        }
        .with_workers(workers)
        .with_backoff(backoff_base, backoff_max)
    }

    /// Restrict the operator to one namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1); // At least 1
        self
    }

    /// Set the per-call store deadline.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Enable periodic resync. Zero disables it.
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = Some(interval).filter(|d| !d.is_zero());
        self
    }

    /// Requeue every successfully reconciled flag after `delay`. Zero disables it.
    pub fn with_requeue_after(mut self, delay: Duration) -> Self {
        self.requeue_after = Some(delay).filter(|d| !d.is_zero());
        self
    }

    /// Set retry backoff bounds. `base` is raised to [`MIN_DELAY`] and `max`
    /// to `base` if smaller.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base.max(MIN_DELAY);
        self.backoff_max = max.max(self.backoff_base);
        self
    }
}
