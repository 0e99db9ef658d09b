//! Kubernetes API server backed store.

use super::{FlagSnapshot, ObjectKey, ResourceStore, StatusUpdate, guarded};
use crate::crd::FeatureFlag;
use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const KIND: &str = "FeatureFlag";

/// Store that reads and writes FeatureFlags through the API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    timeout: Duration,
}

impl KubeStore {
    /// Create a store whose API calls give up after `timeout`.
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn api(&self, namespace: &str) -> Api<FeatureFlag> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl FlagSnapshot {
    /// Build the read view of a fetched object.
    pub fn from_flag(flag: FeatureFlag) -> OperatorResult<Self> {
        let name = flag.name_any();
        let namespace = flag.namespace().ok_or_else(|| OperatorError::InvalidResource {
            key: ObjectKey::new("", name.clone()),
            reason: "FeatureFlag must be namespaced".into(),
        })?;
        let key = ObjectKey::new(namespace, name);
        let resource_version =
            flag.resource_version()
                .ok_or_else(|| OperatorError::InvalidResource {
                    key: key.clone(),
                    reason: "missing metadata.resourceVersion".into(),
                })?;

        Ok(Self {
            key,
            resource_version,
            generation: flag.metadata.generation,
            spec: flag.spec,
            status: flag.status,
        })
    }
}

/// Merge patch for the status subresource.
///
/// Carrying `metadata.resourceVersion` turns the patch into a conditional
/// write: the API server answers 409 if the object moved on.
fn status_patch(update: &StatusUpdate) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "resourceVersion": update.resource_version,
        },
        "status": update.status,
    })
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> OperatorResult<Option<FlagSnapshot>> {
        let api = self.api(&key.namespace);
        let flag = guarded(cancel, self.timeout, async {
            api.get_opt(&key.name).await.map_err(OperatorError::from)
        })
        .await?;

        flag.map(FlagSnapshot::from_flag).transpose()
    }

    async fn update_status(
        &self,
        update: &StatusUpdate,
        cancel: &CancellationToken,
    ) -> OperatorResult<()> {
        let api = self.api(&update.key.namespace);
        let patch = status_patch(update);

        guarded(cancel, self.timeout, async {
            api.patch_status(&update.key.name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .map_err(|e| {
                    OperatorError::from_kube(e, KIND, &update.key, &update.resource_version)
                })
        })
        .await?;

        tracing::debug!(
            key = %update.key,
            resource_version = %update.resource_version,
            active = update.status.active,
            "Patched FeatureFlag status"
        );
        Ok(())
    }
}
