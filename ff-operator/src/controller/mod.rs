//! Reconciliation logic for FeatureFlag resources.
//!
//! - [`FeatureFlagReconciler`]: derives `status.active` from spec and writes it back
//!
//! A reconciler is driven by an [`Operator`](crate::runtime::Operator)
//! through the [`Reconcile`] trait and reports an [`Outcome`]:
//!
//! ```ignore
//! use ff_operator::controller::{ControllerContext, FeatureFlagReconciler, Reconcile};
//!
//! let reconciler = FeatureFlagReconciler::new(Arc::new(ControllerContext::new(store, config)));
//! match reconciler.reconcile(&key, &cancel).await {
//!     Outcome::Done => {}
//!     Outcome::RequeueAfter(delay) => tracing::debug!(?delay, "Polling"),
//!     Outcome::Error(err) => tracing::warn!(error = %err, "Will retry"),
//! }
//! ```

mod feature_flag;

pub use feature_flag::{FeatureFlagReconciler, desired_status};

use crate::config::OperatorConfig;
use crate::error::{ErrorClass, OperatorError, OperatorResult};
use crate::store::{ObjectKey, ResourceStore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared context for controllers.
pub struct ControllerContext {
    /// Resource store.
    pub store: Arc<dyn ResourceStore>,
    /// Operator configuration.
    pub config: OperatorConfig,
}

impl ControllerContext {
    /// Create a new controller context.
    pub fn new(store: Arc<dyn ResourceStore>, config: OperatorConfig) -> Self {
        Self { store, config }
    }
}

/// Successful result of a reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Requeue after the specified duration.
    Requeue(Duration),
    /// Don't requeue (reconciliation complete).
    Done,
}

/// What the controller should do after one reconciliation attempt.
#[derive(Debug)]
pub enum Outcome {
    /// Converged; wait for the next watch event.
    Done,
    /// Run again after the delay.
    RequeueAfter(Duration),
    /// Attempt failed; retry with backoff.
    Error(OperatorError),
}

impl Outcome {
    /// Whether this is [`Outcome::Done`].
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Whether this is [`Outcome::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The error, if any.
    pub fn error(&self) -> Option<&OperatorError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OperatorResult<ReconcileAction>> for Outcome {
    fn from(result: OperatorResult<ReconcileAction>) -> Self {
        match result {
            Ok(ReconcileAction::Done) => Self::Done,
            Ok(ReconcileAction::Requeue(delay)) => Self::RequeueAfter(delay),
            // Deleted objects have nothing left to reconcile.
            Err(err) if err.class() == ErrorClass::NotFound => Self::Done,
            Err(err) => Self::Error(err),
        }
    }
}

/// A control loop body for one resource identity.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// Kind of resource this reconciler owns.
    type Kind: kube::Resource<DynamicType = ()>
        + Clone
        + DeserializeOwned
        + fmt::Debug
        + Send
        + Sync
        + 'static;

    /// Reconcile the resource at `key`. Must honor `cancel` in every store call.
    async fn reconcile(&self, key: &ObjectKey, cancel: &CancellationToken) -> Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_becomes_done() {
        let outcome = Outcome::from(Err(OperatorError::NotFound {
            kind: "FeatureFlag".into(),
            key: ObjectKey::new("default", "gone"),
        }));
        assert!(outcome.is_done());
    }

    #[test]
    fn conflict_stays_an_error() {
        let outcome = Outcome::from(Err(OperatorError::Conflict {
            key: ObjectKey::new("default", "beta"),
            resource_version: "3".into(),
        }));
        assert!(outcome.error().is_some_and(OperatorError::is_conflict));
    }

    #[test]
    fn requeue_maps_through() {
        let outcome = Outcome::from(Ok(ReconcileAction::Requeue(Duration::from_secs(30))));
        assert!(matches!(outcome, Outcome::RequeueAfter(d) if d == Duration::from_secs(30)));
    }
}
