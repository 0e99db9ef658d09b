//! Resource store abstraction.
//!
//! The reconciler only needs two things from the cluster: read a
//! FeatureFlag and write its status subresource under optimistic
//! concurrency. [`ResourceStore`] is that contract.
//!
//! - [`KubeStore`]: backed by the Kubernetes API server
//! - [`MemoryStore`]: in-process store with the same versioning rules
//!
//! Reads return a [`FlagSnapshot`]; writes take a [`StatusUpdate`]. The
//! write view has no spec field, so a status write cannot modify spec.

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

use crate::crd::{FeatureFlagSpec, FeatureFlagStatus};
use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Identity of a namespaced resource; the unit of queueing and dedup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace.
    pub namespace: String,
    /// Name.
    pub name: String,
}

impl ObjectKey {
    /// Create a new key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced Kubernetes object, if it has both namespace and name.
    pub fn from_object<K: kube::Resource>(obj: &K) -> Option<Self> {
        let meta = obj.meta();
        Some(Self::new(meta.namespace.clone()?, meta.name.clone()?))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Read view of a FeatureFlag at one resource version.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSnapshot {
    /// Identity.
    pub key: ObjectKey,
    /// Opaque optimistic-concurrency token.
    pub resource_version: String,
    /// Spec generation, when the store tracks one.
    pub generation: Option<i64>,
    /// Desired state.
    pub spec: FeatureFlagSpec,
    /// Observed state as last written.
    pub status: Option<FeatureFlagStatus>,
}

/// Write view: a status computed from the snapshot at `resource_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Identity.
    pub key: ObjectKey,
    /// Resource version the status was computed from.
    pub resource_version: String,
    /// New status.
    pub status: FeatureFlagStatus,
}

/// Storage contract consumed by the reconciler.
///
/// Every call takes the caller's cancellation token and must return
/// [`OperatorError::Cancelled`] promptly once it fires.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a FeatureFlag. `Ok(None)` when it does not exist.
    async fn get(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> OperatorResult<Option<FlagSnapshot>>;

    /// Replace the status subresource.
    ///
    /// Fails with [`OperatorError::Conflict`] when `update.resource_version`
    /// is no longer current, and [`OperatorError::NotFound`] when the object
    /// is gone.
    async fn update_status(
        &self,
        update: &StatusUpdate,
        cancel: &CancellationToken,
    ) -> OperatorResult<()>;
}

/// Run a store call under a cancellation token and a deadline.
pub async fn guarded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    call: F,
) -> OperatorResult<T>
where
    F: Future<Output = OperatorResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(OperatorError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OperatorError::Cancelled),
        result = tokio::time::timeout(timeout, call) => {
            result.map_err(|_| OperatorError::Timeout(timeout))?
        }
    }
}
