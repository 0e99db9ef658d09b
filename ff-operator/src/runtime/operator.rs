//! Runs a [`Reconcile`] implementation under `kube::runtime::Controller`.

use super::backoff::ExponentialBackoff;
use crate::config::OperatorConfig;
use crate::controller::{Outcome, Reconcile};
use crate::error::{ErrorClass, OperatorError, OperatorResult};
use crate::registry::KindRegistry;
use crate::store::ObjectKey;
use futures::{FutureExt, StreamExt};
use kube::Api;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;

/// Shared state of a running controller: the reconciler, its retry policy
/// and the cancellation token passed to every reconcile.
///
/// Outcomes are translated for the controller as:
/// - `Done`: failure history cleared, [`Action::await_change`]
/// - `RequeueAfter(d)`: failure history cleared, [`Action::requeue`]
/// - `Error`: handed to [`error_policy`], which requeues after the key's
///   next exponential backoff delay
pub struct Operator<R: Reconcile> {
    reconciler: R,
    backoff: ExponentialBackoff,
    config: OperatorConfig,
    cancel: CancellationToken,
}

impl<R: Reconcile> Operator<R> {
    /// Create an operator. Fails if the reconciler's kind is not registered.
    pub fn new(registry: &KindRegistry, reconciler: R, config: OperatorConfig) -> OperatorResult<Self> {
        let kind = registry.require::<R::Kind>()?;
        tracing::debug!(
            api_version = %kind.api_version,
            kind = %kind.kind,
            workers = config.workers,
            "Operator configured"
        );

        Ok(Self {
            reconciler,
            backoff: ExponentialBackoff::new(config.backoff_base, config.backoff_max),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// The retry policy.
    pub fn backoff(&self) -> &ExponentialBackoff {
        &self.backoff
    }

    /// Token passed to every reconcile. Cancelling it aborts in-flight store
    /// calls and shuts the controller down gracefully.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Watch `api` and reconcile until SIGINT/SIGTERM or cancellation.
    pub async fn run(self, api: Api<R::Kind>, watcher_config: WatcherConfig) {
        let concurrency = u16::try_from(self.config.workers).unwrap_or(u16::MAX);
        let mut controller = Controller::new(api, watcher_config)
            .with_config(controller::Config::default().concurrency(concurrency))
            .shutdown_on_signal()
            .graceful_shutdown_on(self.cancel.clone().cancelled_owned());

        if let Some(interval) = self.config.resync_interval.filter(|d| !d.is_zero()) {
            // First tick is skipped; the initial list covers it.
            let start = tokio::time::Instant::now() + interval;
            let ticks = IntervalStream::new(tokio::time::interval_at(start, interval));
            controller = controller.reconcile_all_on(ticks.map(|_| ()));
        }

        tracing::info!(
            workers = self.config.workers,
            resync = ?self.config.resync_interval,
            "Starting controller"
        );

        controller
            .run(reconcile::<R>, error_policy::<R>, Arc::new(self))
            .for_each(|result| async move {
                match result {
                    Ok((obj, action)) => {
                        tracing::debug!(object = %obj, ?action, "Reconciled");
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Controller reported error");
                    }
                }
            })
            .await;

        tracing::info!("Controller stopped");
    }
}

fn key_of<K: kube::Resource>(object: &K) -> OperatorResult<ObjectKey> {
    ObjectKey::from_object(object).ok_or_else(|| OperatorError::InvalidResource {
        key: ObjectKey::new("", object.meta().name.clone().unwrap_or_default()),
        reason: "object must have a namespace and a name".into(),
    })
}

/// Reconcile one object handed over by the controller.
///
/// Panics in the reconciler are caught and reported as
/// [`OperatorError::Panicked`] so the controller keeps running.
pub async fn reconcile<R: Reconcile>(
    object: Arc<R::Kind>,
    ctx: Arc<Operator<R>>,
) -> OperatorResult<Action> {
    let key = key_of(object.as_ref())?;

    let outcome = AssertUnwindSafe(ctx.reconciler.reconcile(&key, &ctx.cancel))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            Outcome::Error(OperatorError::Panicked {
                key: key.clone(),
                message,
            })
        });

    match outcome {
        Outcome::Done => {
            ctx.backoff.forget(&key);
            Ok(Action::await_change())
        }
        Outcome::RequeueAfter(delay) => {
            ctx.backoff.forget(&key);
            Ok(Action::requeue(delay))
        }
        Outcome::Error(err) => Err(err),
    }
}

/// Requeue a failed object after its next backoff delay.
pub fn error_policy<R: Reconcile>(
    object: Arc<R::Kind>,
    err: &OperatorError,
    ctx: Arc<Operator<R>>,
) -> Action {
    let object_ref = ObjectRef::from_obj(object.as_ref());
    let delay = match key_of(object.as_ref()) {
        Ok(key) => ctx.backoff.next_delay(&key),
        Err(_) => ctx.backoff.max_delay(),
    };

    match err.class() {
        ErrorClass::Permanent => {
            tracing::error!(object = %object_ref, error = %err, ?delay, "Reconcile failed");
        }
        ErrorClass::Conflict => {
            tracing::debug!(object = %object_ref, ?delay, "Retrying after conflict");
        }
        ErrorClass::Transient | ErrorClass::NotFound => {
            tracing::warn!(object = %object_ref, error = %err, ?delay, "Reconcile failed, backing off");
        }
    }

    Action::requeue(delay)
}
