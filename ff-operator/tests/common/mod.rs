//! Shared fixtures for integration tests.

#![allow(dead_code)]

use ff_operator::OperatorConfig;
use ff_operator::controller::{ControllerContext, FeatureFlagReconciler};
use ff_operator::crd::{FeatureFlag, FeatureFlagSpec};
use ff_operator::registry::KindRegistry;
use ff_operator::runtime::Operator;
use ff_operator::store::{MemoryStore, ObjectKey};
use std::sync::Arc;
use std::time::Duration;

/// A memory store with a reconciler bound to it.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub reconciler: FeatureFlagReconciler,
    pub config: OperatorConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: OperatorConfig) -> Self {
        let store = Arc::new(MemoryStore::new().with_timeout(config.store_timeout));
        let ctx = Arc::new(ControllerContext::new(store.clone(), config.clone()));
        Self {
            store,
            reconciler: FeatureFlagReconciler::new(ctx),
            config,
        }
    }

    /// Create a flag in namespace `default`.
    pub fn flag(&self, name: &str, enabled: bool, status: bool) -> ObjectKey {
        let key = ObjectKey::new("default", name);
        self.store.apply(&key, FeatureFlagSpec { enabled, status });
        key
    }

    /// Operator wrapping this harness's reconciler, as the binary builds it.
    pub fn operator(&self) -> Arc<Operator<FeatureFlagReconciler>> {
        let operator = Operator::new(
            &KindRegistry::operator_kinds(),
            self.reconciler.clone(),
            self.config.clone(),
        )
        .expect("FeatureFlag is registered");
        Arc::new(operator)
    }

    /// Effective `status.active` of a flag, if a status was written.
    pub fn active(&self, key: &ObjectKey) -> Option<bool> {
        self.store.status(key).map(|s| s.active)
    }
}

/// Object the controller would hand over for `key`.
pub fn object(key: &ObjectKey) -> Arc<FeatureFlag> {
    let mut flag = FeatureFlag::new(&key.name, FeatureFlagSpec::default());
    flag.metadata.namespace = Some(key.namespace.clone());
    Arc::new(flag)
}

/// Small timeouts and backoff so tests converge quickly.
pub fn test_config() -> OperatorConfig {
    OperatorConfig::default()
        .with_workers(2)
        .with_store_timeout(Duration::from_secs(2))
        .with_backoff(Duration::from_millis(1), Duration::from_millis(20))
}
