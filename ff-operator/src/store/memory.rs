//! In-process store following the API server's versioning rules.
//!
//! Every mutation (spec apply, status write, metadata touch) advances the
//! object's resource version; spec changes also advance its generation. A
//! status write whose resource version is not current is rejected with
//! [`OperatorError::Conflict`].
//!
//! Fault injection hooks make the failure paths of the reconciler testable.

use super::{FlagSnapshot, ObjectKey, ResourceStore, StatusUpdate, guarded};
use crate::crd::{FeatureFlag, FeatureFlagSpec, FeatureFlagStatus};
use crate::error::{OperatorError, OperatorResult};
use crate::registry::KindRegistry;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct Entry {
    resource_version: u64,
    generation: i64,
    spec: FeatureFlagSpec,
    status: Option<FeatureFlagStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Unavailable,
    Conflict,
    Delete,
    Stall,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, Entry>,
    last_version: u64,
    get_fault: Option<Fault>,
    update_fault: Option<Fault>,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn snapshot(&self, key: &ObjectKey) -> Option<FlagSnapshot> {
        self.objects.get(key).map(|entry| FlagSnapshot {
            key: key.clone(),
            resource_version: entry.resource_version.to_string(),
            generation: Some(entry.generation),
            spec: entry.spec.clone(),
            status: entry.status.clone(),
        })
    }

    fn touch(&mut self, key: &ObjectKey) -> bool {
        let version = self.next_version();
        match self.objects.get_mut(key) {
            Some(entry) => {
                entry.resource_version = version;
                true
            }
            None => false,
        }
    }
}

/// In-memory [`ResourceStore`].
pub struct MemoryStore {
    inner: Mutex<Inner>,
    timeout: Duration,
    gets: AtomicUsize,
    update_attempts: AtomicUsize,
    status_writes: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            timeout: Duration::from_secs(10),
            gets: AtomicUsize::new(0),
            update_attempts: AtomicUsize::new(0),
            status_writes: AtomicUsize::new(0),
        }
    }

    /// Set the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create or update a FeatureFlag's spec. Returns the new resource version.
    pub fn apply(&self, key: &ObjectKey, spec: FeatureFlagSpec) -> String {
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        match inner.objects.get_mut(key) {
            Some(entry) => {
                if entry.spec != spec {
                    entry.generation += 1;
                    entry.spec = spec;
                }
                entry.resource_version = version;
            }
            None => {
                inner.objects.insert(
                    key.clone(),
                    Entry {
                        resource_version: version,
                        generation: 1,
                        spec,
                        status: None,
                    },
                );
            }
        }
        version.to_string()
    }

    /// Apply a YAML manifest of a registered kind.
    pub fn apply_manifest(&self, registry: &KindRegistry, yaml: &str) -> OperatorResult<ObjectKey> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        let flag: FeatureFlag = registry.decode(value)?;
        let key = ObjectKey::from_object(&flag).ok_or_else(|| OperatorError::InvalidResource {
            key: ObjectKey::new("", flag.metadata.name.clone().unwrap_or_default()),
            reason: "manifest must carry metadata.namespace and metadata.name".into(),
        })?;
        self.apply(&key, flag.spec);
        Ok(key)
    }

    /// Delete a FeatureFlag. Returns whether it existed.
    pub fn delete(&self, key: &ObjectKey) -> bool {
        self.inner.lock().objects.remove(key).is_some()
    }

    /// Advance the resource version without touching spec or status, as a
    /// label or annotation edit by another actor would.
    pub fn bump_version(&self, key: &ObjectKey) -> bool {
        self.inner.lock().touch(key)
    }

    /// Current state of an object.
    pub fn snapshot(&self, key: &ObjectKey) -> Option<FlagSnapshot> {
        self.inner.lock().snapshot(key)
    }

    /// Current status of an object.
    pub fn status(&self, key: &ObjectKey) -> Option<FeatureFlagStatus> {
        self.inner.lock().objects.get(key).and_then(|e| e.status.clone())
    }

    /// Next `get` fails as if the store were unreachable.
    pub fn fail_next_get(&self) {
        self.inner.lock().get_fault = Some(Fault::Unavailable);
    }

    /// Next `get` never completes on its own.
    pub fn stall_next_get(&self) {
        self.inner.lock().get_fault = Some(Fault::Stall);
    }

    /// Next `update_status` fails as if the store were unreachable.
    pub fn fail_next_update(&self) {
        self.inner.lock().update_fault = Some(Fault::Unavailable);
    }

    /// Another actor modifies the object right before the next `update_status`.
    pub fn conflict_next_update(&self) {
        self.inner.lock().update_fault = Some(Fault::Conflict);
    }

    /// Another actor deletes the object right before the next `update_status`.
    pub fn delete_before_next_update(&self) {
        self.inner.lock().update_fault = Some(Fault::Delete);
    }

    /// Number of `get` calls.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `update_status` calls, successful or not.
    pub fn update_attempts(&self) -> usize {
        self.update_attempts.load(Ordering::SeqCst)
    }

    /// Number of accepted status writes.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn write_status(&self, update: &StatusUpdate) -> OperatorResult<()> {
        let mut inner = self.inner.lock();

        match inner.update_fault.take() {
            Some(Fault::Unavailable) => {
                return Err(OperatorError::Unavailable("injected update failure".into()));
            }
            Some(Fault::Conflict) => {
                inner.touch(&update.key);
            }
            Some(Fault::Delete) => {
                inner.objects.remove(&update.key);
            }
            Some(Fault::Stall) | None => {}
        }

        let version = inner.next_version();
        let entry = inner
            .objects
            .get_mut(&update.key)
            .ok_or_else(|| OperatorError::NotFound {
                kind: "FeatureFlag".into(),
                key: update.key.clone(),
            })?;

        if entry.resource_version.to_string() != update.resource_version {
            return Err(OperatorError::Conflict {
                key: update.key.clone(),
                resource_version: update.resource_version.clone(),
            });
        }

        entry.status = Some(update.status.clone());
        entry.resource_version = version;
        drop(inner);

        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> OperatorResult<Option<FlagSnapshot>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let fault = self.inner.lock().get_fault.take();

        guarded(cancel, self.timeout, async {
            match fault {
                Some(Fault::Unavailable) => {
                    return Err(OperatorError::Unavailable("injected get failure".into()));
                }
                Some(Fault::Stall) => std::future::pending::<()>().await,
                Some(Fault::Conflict) | Some(Fault::Delete) | None => {}
            }
            let snapshot = self.inner.lock().snapshot(key);
            Ok(snapshot)
        })
        .await
    }

    async fn update_status(
        &self,
        update: &StatusUpdate,
        cancel: &CancellationToken,
    ) -> OperatorResult<()> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        guarded(cancel, self.timeout, async { self.write_status(update) }).await
    }
}
