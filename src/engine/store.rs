//! # Object Store
//!
//! Abstraction over typed Kubernetes object access.
//!
//! The reconciliation engine never talks to the API server directly; it goes
//! through [`ObjectStore`] so that "not found" and "write conflict" are
//! first-class, matchable cases rather than status codes buried in a client
//! error. [`KubeStore`] is the production implementation; tests use an
//! in-memory store with the same contract.

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use thiserror::Error;

/// Errors surfaced by an object store.
///
/// `NotFound` and `Conflict` are deliberately separate variants: the engine
/// recovers from both locally (create on not-found, short requeue on
/// conflict) and must never confuse them with real API failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested object does not exist
    #[error("object not found")]
    NotFound,
    /// The stored version token no longer matches the one the caller read
    #[error("write conflict: stored version token does not match")]
    Conflict,
    /// The object is missing metadata required for the operation
    #[error("object has no {0} set")]
    MissingMetadata(&'static str),
    /// Any other store failure
    #[error("store request failed: {0}")]
    Api(#[source] anyhow::Error),
}

impl StoreError {
    fn from_kube(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(response) if response.code == 404 => StoreError::NotFound,
            kube::Error::Api(response) if response.code == 409 => StoreError::Conflict,
            _ => StoreError::Api(err.into()),
        }
    }
}

/// Typed object access with optimistic concurrency.
///
/// All writes that carry an object use the version token present in that
/// object's metadata; a mismatch comes back as [`StoreError::Conflict`].
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    /// Fetch an object by namespace and name; `None` when absent
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// Create a new object; conflicts when it already exists
    async fn create(&self, object: &K) -> Result<K, StoreError>;

    /// Replace an existing object
    async fn update(&self, object: &K) -> Result<K, StoreError>;

    /// Replace only the status sub-document of an existing object
    async fn update_status(&self, object: &K) -> Result<(), StoreError>;

    /// Delete an object by namespace and name
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Delete every object in the namespace matching a label selector
    async fn delete_all_matching(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<(), StoreError>;
}

/// [`ObjectStore`] backed by the Kubernetes API server
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let namespace = object
            .meta()
            .namespace
            .clone()
            .ok_or(StoreError::MissingMetadata("namespace"))?;
        self.api(&namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        let namespace = object
            .meta()
            .namespace
            .clone()
            .ok_or(StoreError::MissingMetadata("namespace"))?;
        let name = object
            .meta()
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("name"))?;
        self.api(&namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn update_status(&self, object: &K) -> Result<(), StoreError> {
        let namespace = object
            .meta()
            .namespace
            .clone()
            .ok_or(StoreError::MissingMetadata("namespace"))?;
        let name = object
            .meta()
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("name"))?;
        let payload =
            serde_json::to_vec(object).map_err(|e| StoreError::Api(anyhow::Error::new(e)))?;
        self.api(&namespace)
            .replace_status(&name, &PostParams::default(), payload)
            .await
            .map(|_| ())
            .map_err(StoreError::from_kube)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(StoreError::from_kube)
    }

    async fn delete_all_matching(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<(), StoreError> {
        self.api(namespace)
            .delete_collection(
                &DeleteParams::default(),
                &ListParams::default().labels(label_selector),
            )
            .await
            .map(|_| ())
            .map_err(StoreError::from_kube)
    }
}
