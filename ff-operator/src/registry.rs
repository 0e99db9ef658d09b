//! Registry of the resource kinds this process understands.
//!
//! Built once at startup with [`KindRegistry::builder`] and handed to the
//! components that need it (the operator, CRD generation, manifest decoding).
//! It is immutable after [`KindRegistryBuilder::build`].

use crate::crd::FeatureFlag;
use crate::error::{OperatorError, OperatorResult};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{CustomResourceExt, Resource};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Static description of a registered kind.
#[derive(Debug, Clone)]
pub struct KindInfo {
    /// API group.
    pub group: String,
    /// API version within the group.
    pub version: String,
    /// `group/version`.
    pub api_version: String,
    /// Kind name.
    pub kind: String,
    /// Plural resource name.
    pub plural: String,
    /// Whether objects of this kind live in a namespace.
    pub namespaced: bool,
    crd: fn() -> CustomResourceDefinition,
}

impl KindInfo {
    /// The kind's CustomResourceDefinition.
    pub fn crd(&self) -> CustomResourceDefinition {
        (self.crd)()
    }
}

type KindId = (String, String);

/// Read-only kind registry.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<KindId, KindInfo>,
}

/// Builder for [`KindRegistry`].
#[derive(Debug, Default)]
pub struct KindRegistryBuilder {
    kinds: BTreeMap<KindId, KindInfo>,
}

impl KindRegistryBuilder {
    /// Register a custom resource kind.
    pub fn register<K>(mut self) -> Self
    where
        K: CustomResourceExt + Resource<DynamicType = ()>,
    {
        let crd = K::crd();
        let info = KindInfo {
            group: K::group(&()).into_owned(),
            version: K::version(&()).into_owned(),
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            plural: K::plural(&()).into_owned(),
            namespaced: crd.spec.scope == "Namespaced",
            crd: K::crd,
        };
        self.kinds
            .insert((info.api_version.clone(), info.kind.clone()), info);
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> KindRegistry {
        KindRegistry { kinds: self.kinds }
    }
}

impl KindRegistry {
    /// Start building a registry.
    pub fn builder() -> KindRegistryBuilder {
        KindRegistryBuilder::default()
    }

    /// Registry with every kind this operator reconciles.
    pub fn operator_kinds() -> Self {
        Self::builder().register::<FeatureFlag>().build()
    }

    /// Look up a kind by `apiVersion` and `kind`.
    pub fn lookup(&self, api_version: &str, kind: &str) -> Option<&KindInfo> {
        self.kinds.get(&(api_version.to_string(), kind.to_string()))
    }

    /// Look up a statically typed kind, failing if it was never registered.
    pub fn require<K>(&self) -> OperatorResult<&KindInfo>
    where
        K: Resource<DynamicType = ()>,
    {
        let api_version = K::api_version(&());
        let kind = K::kind(&());
        self.lookup(&api_version, &kind).ok_or_else(|| {
            OperatorError::InvalidConfig(format!("kind {api_version}/{kind} is not registered"))
        })
    }

    /// Registered kinds in a stable order.
    pub fn kinds(&self) -> impl Iterator<Item = &KindInfo> {
        self.kinds.values()
    }

    /// CRDs of every registered kind.
    pub fn crds(&self) -> Vec<CustomResourceDefinition> {
        self.kinds().map(KindInfo::crd).collect()
    }

    /// Decode a raw object into `K` after checking its `apiVersion`/`kind`
    /// header against the registry.
    pub fn decode<K>(&self, value: serde_json::Value) -> OperatorResult<K>
    where
        K: DeserializeOwned + Resource<DynamicType = ()>,
    {
        let header = |field: &str| {
            value
                .get(field)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| OperatorError::SerializationError(format!("object has no {field}")))
        };
        let api_version = header("apiVersion")?;
        let kind = header("kind")?;

        let info = self.lookup(&api_version, &kind).ok_or_else(|| {
            OperatorError::SerializationError(format!("unregistered kind {api_version}/{kind}"))
        })?;

        if info.api_version != K::api_version(&()) || info.kind != K::kind(&()) {
            return Err(OperatorError::SerializationError(format!(
                "expected {}/{}, got {api_version}/{kind}",
                K::api_version(&()),
                K::kind(&())
            )));
        }

        Ok(serde_json::from_value(value)?)
    }
}
