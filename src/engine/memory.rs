//! In-memory [`ObjectStore`] used by unit tests.
//!
//! Mirrors the API server's contract closely enough for the engine's
//! semantics to be exercised: version tokens on every object, conflicts on
//! stale writes, label-selector deletes, and a write counter so tests can
//! assert "no additional writes happened".

use super::store::{ObjectStore, StoreError};
use async_trait::async_trait;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<(String, String), Value>>,
    version: AtomicU64,
    writes: AtomicUsize,
    fail_next_write: AtomicBool,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            writes: AtomicUsize::new(0),
            fail_next_write: AtomicBool::new(false),
            _kind: PhantomData,
        }
    }
}

impl<K> std::fmt::Debug for MemoryStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl<K> MemoryStore<K>
where
    K: Resource + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes (create/update/update_status) performed so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next update or status update fail with a version conflict
    pub fn fail_next_write_with_conflict(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Names of all stored objects in a namespace
    pub fn names_in(&self, namespace: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Insert an object without counting it as a reconciliation write
    pub fn seed(&self, object: &K) {
        let key = key_of(object).expect("seeded object needs namespace and name");
        let mut value = serde_json::to_value(object).expect("object serializes");
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        value["metadata"]["resourceVersion"] = Value::String(version.to_string());
        self.objects.lock().unwrap().insert(key, value);
    }

    fn take_injected_conflict(&self) -> bool {
        self.fail_next_write.swap(false, Ordering::SeqCst)
    }

    fn stored_version(value: &Value) -> Option<&str> {
        value
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
    }
}

fn key_of<K: Resource>(object: &K) -> Option<(String, String)> {
    Some((
        object.meta().namespace.clone()?,
        object.meta().name.clone()?,
    ))
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Serialize + DeserializeOwned + Clone + Send + Sync,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        let objects = self.objects.lock().unwrap();
        match objects.get(&(namespace.to_owned(), name.to_owned())) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StoreError::Api(anyhow::Error::new(e))),
            None => Ok(None),
        }
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let key = key_of(object).ok_or(StoreError::MissingMetadata("name"))?;
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        let mut value =
            serde_json::to_value(object).map_err(|e| StoreError::Api(anyhow::Error::new(e)))?;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        value["metadata"]["resourceVersion"] = Value::String(version.to_string());
        let created: K = serde_json::from_value(value.clone())
            .map_err(|e| StoreError::Api(anyhow::Error::new(e)))?;
        objects.insert(key, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict);
        }
        let key = key_of(object).ok_or(StoreError::MissingMetadata("name"))?;
        let mut objects = self.objects.lock().unwrap();
        let stored = objects.get_mut(&key).ok_or(StoreError::NotFound)?;
        if object.meta().resource_version.as_deref() != Self::stored_version(stored) {
            return Err(StoreError::Conflict);
        }
        let mut value =
            serde_json::to_value(object).map_err(|e| StoreError::Api(anyhow::Error::new(e)))?;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        value["metadata"]["resourceVersion"] = Value::String(version.to_string());
        let updated: K = serde_json::from_value(value.clone())
            .map_err(|e| StoreError::Api(anyhow::Error::new(e)))?;
        *stored = value;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn update_status(&self, object: &K) -> Result<(), StoreError> {
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict);
        }
        let key = key_of(object).ok_or(StoreError::MissingMetadata("name"))?;
        let mut objects = self.objects.lock().unwrap();
        let stored = objects.get_mut(&key).ok_or(StoreError::NotFound)?;
        if object.meta().resource_version.as_deref() != Self::stored_version(stored) {
            return Err(StoreError::Conflict);
        }
        let value =
            serde_json::to_value(object).map_err(|e| StoreError::Api(anyhow::Error::new(e)))?;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        stored["status"] = value.get("status").cloned().unwrap_or(Value::Null);
        stored["metadata"]["resourceVersion"] = Value::String(version.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap();
        objects
            .remove(&(namespace.to_owned(), name.to_owned()))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn delete_all_matching(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<(), StoreError> {
        let wanted: Vec<(&str, &str)> = label_selector
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let mut objects = self.objects.lock().unwrap();
        objects.retain(|(ns, _), value| {
            if ns != namespace {
                return true;
            }
            let labels = value.pointer("/metadata/labels").and_then(Value::as_object);
            let matches = wanted.iter().all(|(k, v)| {
                labels.is_some_and(|l| l.get(*k).and_then(Value::as_str) == Some(*v))
            });
            !matches
        });
        Ok(())
    }
}
