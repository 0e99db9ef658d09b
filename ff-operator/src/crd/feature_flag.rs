//! FeatureFlag Custom Resource Definition.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// FeatureFlag is the Schema for the featureflags API.
///
/// Authors own `spec`; the operator owns `status` and keeps
/// `status.active == spec.enabled && spec.status`.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "deployment.github.com",
    version = "v1alpha1",
    kind = "FeatureFlag",
    plural = "featureflags",
    shortname = "ff",
    namespaced,
    status = "FeatureFlagStatus",
    printcolumn = r#"{"name":"Enabled", "type":"boolean", "jsonPath":".spec.enabled"}"#,
    printcolumn = r#"{"name":"Desired", "type":"boolean", "jsonPath":".spec.status"}"#,
    printcolumn = r#"{"name":"Active", "type":"boolean", "jsonPath":".status.active"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagSpec {
    /// Whether the feature gate is in effect at all.
    pub enabled: bool,

    /// Desired activation value while the gate is enabled.
    pub status: bool,
}

/// FeatureFlag status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagStatus {
    /// Effective activation state.
    pub active: bool,

    /// Generation of the spec this status was computed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
