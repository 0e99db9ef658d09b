//! FeatureFlag controller.
//!
//! Each pass is one fetch, one pure computation and at most one status
//! write. Nothing is cached between passes and nothing but the status
//! subresource is ever written.

use super::{ControllerContext, Outcome, Reconcile, ReconcileAction};
use crate::crd::{FeatureFlag, FeatureFlagSpec, FeatureFlagStatus};
use crate::error::OperatorResult;
use crate::store::{ObjectKey, StatusUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Status the operator should report for `spec` at `generation`.
///
/// A disabled flag is never active, whatever its desired value.
pub fn desired_status(spec: &FeatureFlagSpec, generation: Option<i64>) -> FeatureFlagStatus {
    FeatureFlagStatus {
        active: spec.enabled && spec.status,
        observed_generation: generation,
    }
}

/// Controller for FeatureFlag resources.
#[derive(Clone)]
pub struct FeatureFlagReconciler {
    ctx: Arc<ControllerContext>,
}

impl FeatureFlagReconciler {
    /// Create a new FeatureFlag reconciler.
    pub fn new(ctx: Arc<ControllerContext>) -> Self {
        Self { ctx }
    }

    /// Reconcile a FeatureFlag.
    ///
    /// 1. Fetches the current object (gone means done)
    /// 2. Computes the desired status from spec
    /// 3. Writes it back, conditional on the resource version just read
    ///
    /// A stale resource version surfaces as a conflict error so the caller
    /// retries with a fresh read instead of merging.
    pub async fn try_reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> OperatorResult<ReconcileAction> {
        tracing::info!(
            namespace = %key.namespace,
            name = %key.name,
            "Reconciling FeatureFlag"
        );

        let Some(flag) = self.ctx.store.get(key, cancel).await? else {
            tracing::debug!(key = %key, "FeatureFlag no longer exists, nothing to do");
            return Ok(ReconcileAction::Done);
        };

        let desired = desired_status(&flag.spec, flag.generation);
        if flag.status.as_ref() == Some(&desired) {
            tracing::debug!(
                key = %key,
                active = desired.active,
                "FeatureFlag status already up to date"
            );
            return Ok(self.converged());
        }

        let update = StatusUpdate {
            key: key.clone(),
            resource_version: flag.resource_version,
            status: desired,
        };

        self.ctx
            .store
            .update_status(&update, cancel)
            .await
            .inspect_err(|e| {
                if e.is_conflict() {
                    tracing::warn!(
                        key = %key,
                        resource_version = %update.resource_version,
                        "FeatureFlag changed during reconcile, retrying with a fresh read"
                    );
                }
            })?;

        tracing::info!(
            key = %key,
            enabled = flag.spec.enabled,
            desired = flag.spec.status,
            active = update.status.active,
            "Updated FeatureFlag status"
        );
        Ok(self.converged())
    }

    fn converged(&self) -> ReconcileAction {
        match self.ctx.config.requeue_after.filter(|d| !d.is_zero()) {
            Some(delay) => ReconcileAction::Requeue(delay),
            None => ReconcileAction::Done,
        }
    }
}

#[async_trait]
impl Reconcile for FeatureFlagReconciler {
    type Kind = FeatureFlag;

    async fn reconcile(&self, key: &ObjectKey, cancel: &CancellationToken) -> Outcome {
        Outcome::from(self.try_reconcile(key, cancel).await)
    }
}
