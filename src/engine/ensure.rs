//! # Ensure
//!
//! Create-or-update reconciliation of one owned child object.
//!
//! `ensure` drives a child toward a desired-state template: metadata
//! policies run first (owner stamping, label/annotation inheritance), then
//! the live object is compared structurally and only written when it
//! actually differs. A live object carrying the pause annotation is never
//! touched, whatever the desired state says.

use crate::constants;
use crate::engine::store::{ObjectStore, StoreError};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Metadata policy applied to the desired object before comparison.
/// Policies run in order and may fail terminally (e.g. owner UID missing).
pub type EnsurePolicy<K> = Box<dyn Fn(&mut K) -> Result<(), EnsureError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum EnsureError {
    /// Optimistic-lock conflict; callers translate this into a short requeue
    /// rather than surfacing it as a failure
    #[error("write conflict while ensuring owned object")]
    Conflict,
    /// The desired object is not usable as written
    #[error("invalid desired object: {0}")]
    InvalidObject(String),
    /// A metadata policy could not be applied; terminal until the spec changes
    #[error("metadata policy failed: {0}")]
    Policy(String),
    /// Store failure other than a conflict
    #[error(transparent)]
    Store(StoreError),
    #[error("object serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for EnsureError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => EnsureError::Conflict,
            other => EnsureError::Store(other),
        }
    }
}

/// Whether a live object has reconciliation paused via annotation.
/// Only the exact value `"true"` pauses.
pub fn paused<K: Resource>(object: &K) -> bool {
    object
        .meta()
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(constants::PAUSE_ANNOTATION))
        .is_some_and(|value| value == "true")
}

/// Reconcile one owned child object against its desired-state template.
///
/// Returns whether a write happened. Absent objects are created; present
/// ones are updated only when their meaningful fields (everything except
/// metadata and status, plus the desired labels/annotations/owner
/// references) differ from the template. The merged update starts from the
/// live object so the stored version token rides along and stale writes
/// surface as [`EnsureError::Conflict`].
pub async fn ensure<K>(
    store: &dyn ObjectStore<K>,
    mut desired: K,
    policies: &[EnsurePolicy<K>],
) -> Result<bool, EnsureError>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    for policy in policies {
        policy(&mut desired)?;
    }

    let name = desired
        .meta()
        .name
        .clone()
        .ok_or_else(|| EnsureError::InvalidObject("desired object has no name".to_string()))?;
    let namespace = desired
        .meta()
        .namespace
        .clone()
        .ok_or_else(|| EnsureError::InvalidObject("desired object has no namespace".to_string()))?;

    let Some(live) = store.get(&namespace, &name).await.map_err(EnsureError::from)? else {
        store.create(&desired).await.map_err(EnsureError::from)?;
        debug!(%namespace, %name, "created owned object");
        return Ok(true);
    };

    if paused(&live) {
        debug!(%namespace, %name, "owned object paused, skipping reconciliation");
        return Ok(false);
    }

    let desired_value = serde_json::to_value(&desired)?;
    let live_value = serde_json::to_value(&live)?;
    if !needs_update(&desired_value, &live_value) {
        return Ok(false);
    }

    let merged: K = serde_json::from_value(merge_into_live(desired_value, live_value))?;
    store.update(&merged).await.map_err(EnsureError::from)?;
    debug!(%namespace, %name, "updated owned object");
    Ok(true)
}

/// Top-level fields that are never part of the structural comparison
const NON_SEMANTIC_FIELDS: &[&str] = &["apiVersion", "kind", "metadata", "status"];

fn needs_update(desired: &Value, live: &Value) -> bool {
    let Some(fields) = desired.as_object() else {
        return true;
    };
    let semantic_differs = fields
        .iter()
        .filter(|(key, _)| !NON_SEMANTIC_FIELDS.contains(&key.as_str()))
        .any(|(key, value)| live.get(key) != Some(value));
    semantic_differs
        || !map_contains(desired, live, "/metadata/labels")
        || !map_contains(desired, live, "/metadata/annotations")
        || !owner_refs_present(desired, live)
}

/// Every entry of the desired map must be present, with equal value, in live
fn map_contains(desired: &Value, live: &Value, pointer: &str) -> bool {
    let Some(wanted) = desired.pointer(pointer).and_then(Value::as_object) else {
        return true;
    };
    let have = live.pointer(pointer).and_then(Value::as_object);
    wanted
        .iter()
        .all(|(key, value)| have.is_some_and(|map| map.get(key) == Some(value)))
}

fn owner_refs_present(desired: &Value, live: &Value) -> bool {
    let Some(wanted) = desired
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
    else {
        return true;
    };
    let have = live
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array);
    wanted.iter().all(|wanted_ref| {
        have.is_some_and(|refs| {
            refs.iter()
                .any(|live_ref| live_ref.get("uid") == wanted_ref.get("uid"))
        })
    })
}

/// Fold the desired object into the live one, preserving the live metadata
/// (and with it the version token) apart from the inherited keys.
fn merge_into_live(desired: Value, mut live: Value) -> Value {
    let Value::Object(fields) = desired else {
        return live;
    };
    for (key, value) in fields {
        match key.as_str() {
            "metadata" => merge_metadata(&value, &mut live),
            "apiVersion" | "kind" | "status" => {}
            _ => {
                live[key.as_str()] = value;
            }
        }
    }
    live
}

fn merge_metadata(desired_meta: &Value, live: &mut Value) {
    for key in ["labels", "annotations"] {
        if let Some(Value::Object(wanted)) = desired_meta.get(key) {
            let target = &mut live["metadata"][key];
            if target.is_null() {
                *target = Value::Object(serde_json::Map::new());
            }
            if let Some(map) = target.as_object_mut() {
                for (k, v) in wanted {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
    }
    if let Some(refs) = desired_meta.get("ownerReferences") {
        live["metadata"]["ownerReferences"] = refs.clone();
    }
}

/// Policy stamping a controlling owner reference onto the child.
///
/// Children record the parent's identity and UID; actual cascading deletion
/// is the garbage collector's job. Fails terminally when the owner has no
/// UID yet, since a dangling reference would orphan the child.
pub fn owned_by<K, O>(owner: &O) -> EnsurePolicy<K>
where
    K: Resource + 'static,
    O: Resource<DynamicType = ()>,
{
    let api_version = O::api_version(&()).into_owned();
    let kind = O::kind(&()).into_owned();
    let owner_name = owner.meta().name.clone();
    let owner_uid = owner.meta().uid.clone();
    Box::new(move |child: &mut K| {
        let (Some(name), Some(uid)) = (owner_name.clone(), owner_uid.clone()) else {
            return Err(EnsureError::Policy(
                "owner name and UID must be set before stamping owner references".to_string(),
            ));
        };
        let owner_ref = k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
            api_version: api_version.clone(),
            kind: kind.clone(),
            name,
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        };
        let refs = child
            .meta_mut()
            .owner_references
            .get_or_insert_with(Vec::new);
        if !refs.iter().any(|existing| existing.uid == owner_ref.uid) {
            refs.push(owner_ref);
        }
        Ok(())
    })
}

/// Policy copying the parent's inheritable labels and annotations onto the
/// child. Everything outside the allow-lists is dropped so internal
/// bookkeeping annotations never leak into children.
pub fn inherit_metadata<K, O>(parent: &O) -> EnsurePolicy<K>
where
    K: Resource + 'static,
    O: Resource,
{
    let labels = filtered(parent.meta().labels.as_ref(), constants::INHERITED_LABELS);
    let annotations = filtered(
        parent.meta().annotations.as_ref(),
        constants::INHERITED_ANNOTATIONS,
    );
    Box::new(move |child: &mut K| {
        if !labels.is_empty() {
            child
                .meta_mut()
                .labels
                .get_or_insert_with(BTreeMap::new)
                .extend(labels.clone());
        }
        if !annotations.is_empty() {
            child
                .meta_mut()
                .annotations
                .get_or_insert_with(BTreeMap::new)
                .extend(annotations.clone());
        }
        Ok(())
    })
}

fn filtered(
    source: Option<&BTreeMap<String, String>>,
    allowed: &[&str],
) -> BTreeMap<String, String> {
    source
        .map(|map| {
            map.iter()
                .filter(|(key, _)| allowed.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn desired_config_map(name: &str, value: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([("value".to_string(), value.to_string())])),
            ..ConfigMap::default()
        }
    }

    #[tokio::test]
    async fn test_ensure_creates_when_absent() {
        let store = MemoryStore::<ConfigMap>::new();
        let changed = ensure(&store, desired_config_map("cm", "a"), &[])
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = MemoryStore::<ConfigMap>::new();
        ensure(&store, desired_config_map("cm", "a"), &[])
            .await
            .unwrap();
        let changed = ensure(&store, desired_config_map("cm", "a"), &[])
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(store.writes(), 1, "second ensure must not write");
    }

    #[tokio::test]
    async fn test_ensure_updates_when_changed() {
        let store = MemoryStore::<ConfigMap>::new();
        ensure(&store, desired_config_map("cm", "a"), &[])
            .await
            .unwrap();
        let changed = ensure(&store, desired_config_map("cm", "b"), &[])
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(store.writes(), 2);

        let live = store.get("default", "cm").await.unwrap().unwrap();
        assert_eq!(live.data.unwrap()["value"], "b");
    }

    #[tokio::test]
    async fn test_ensure_respects_pause_annotation() {
        let store = MemoryStore::<ConfigMap>::new();
        let mut live = desired_config_map("cm", "a");
        live.metadata.annotations = Some(BTreeMap::from([(
            constants::PAUSE_ANNOTATION.to_string(),
            "true".to_string(),
        )]));
        store.seed(&live);

        let changed = ensure(&store, desired_config_map("cm", "completely-different"), &[])
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_ensure_pause_requires_exact_true() {
        let store = MemoryStore::<ConfigMap>::new();
        let mut live = desired_config_map("cm", "a");
        live.metadata.annotations = Some(BTreeMap::from([(
            constants::PAUSE_ANNOTATION.to_string(),
            "yes".to_string(),
        )]));
        store.seed(&live);

        let changed = ensure(&store, desired_config_map("cm", "b"), &[])
            .await
            .unwrap();
        assert!(changed, "any value other than \"true\" does not pause");
    }

    #[tokio::test]
    async fn test_ensure_translates_conflict() {
        let store = MemoryStore::<ConfigMap>::new();
        store.seed(&desired_config_map("cm", "a"));
        store.fail_next_write_with_conflict();

        let err = ensure(&store, desired_config_map("cm", "b"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EnsureError::Conflict));
    }

    #[tokio::test]
    async fn test_owned_by_requires_uid() {
        let store = MemoryStore::<ConfigMap>::new();
        let owner = desired_config_map("owner", "x");
        let policies = vec![owned_by::<ConfigMap, ConfigMap>(&owner)];
        let err = ensure(&store, desired_config_map("cm", "a"), &policies)
            .await
            .unwrap_err();
        assert!(matches!(err, EnsureError::Policy(_)));
    }

    #[tokio::test]
    async fn test_owned_by_stamps_reference() {
        let store = MemoryStore::<ConfigMap>::new();
        let mut owner = desired_config_map("owner", "x");
        owner.metadata.uid = Some("uid-1234".to_string());
        let policies = vec![owned_by::<ConfigMap, ConfigMap>(&owner)];
        ensure(&store, desired_config_map("cm", "a"), &policies)
            .await
            .unwrap();

        let live = store.get("default", "cm").await.unwrap().unwrap();
        let refs = live.metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].uid, "uid-1234");
        assert_eq!(refs[0].controller, Some(true));
    }

    #[tokio::test]
    async fn test_inherit_metadata_filters_allow_list() {
        let store = MemoryStore::<ConfigMap>::new();
        let mut parent = desired_config_map("owner", "x");
        parent.metadata.annotations = Some(BTreeMap::from([
            (
                "trust-stack.io/trusted-ca".to_string(),
                "ca-bundle".to_string(),
            ),
            (
                "internal.trust-stack.io/bookkeeping".to_string(),
                "do-not-leak".to_string(),
            ),
        ]));
        let policies = vec![inherit_metadata::<ConfigMap, ConfigMap>(&parent)];
        ensure(&store, desired_config_map("cm", "a"), &policies)
            .await
            .unwrap();

        let live = store.get("default", "cm").await.unwrap().unwrap();
        let annotations = live.metadata.annotations.unwrap();
        assert_eq!(
            annotations.get("trust-stack.io/trusted-ca").map(String::as_str),
            Some("ca-bundle")
        );
        assert!(!annotations.contains_key("internal.trust-stack.io/bookkeeping"));
    }
}
