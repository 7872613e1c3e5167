//! # Context
//!
//! Shared state handed to every reconciliation. Stores are trait objects so
//! tests can swap the API server for an in-memory double.

use crate::crd::{
    CertificateAuthority, MetadataService, TimestampAuthority, TransparencyLog, TreeLog, TrustStack,
};
use crate::engine::store::{KubeStore, ObjectStore};
use crate::pki::FipsMode;
use crate::runtime::error_policy::BackoffState;
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct Context {
    pub trust_stacks: Arc<dyn ObjectStore<TrustStack>>,
    pub timestamp_authorities: Arc<dyn ObjectStore<TimestampAuthority>>,
    pub transparency_logs: Arc<dyn ObjectStore<TransparencyLog>>,
    pub tree_logs: Arc<dyn ObjectStore<TreeLog>>,
    pub certificate_authorities: Arc<dyn ObjectStore<CertificateAuthority>>,
    pub metadata_services: Arc<dyn ObjectStore<MetadataService>>,
    pub secrets: Arc<dyn ObjectStore<Secret>>,
    /// Compliance mode, read once at process start
    pub fips: FipsMode,
    /// Per-resource backoff state keyed by `namespace/name`, consumed by the
    /// error-policy layer
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("fips", &self.fips)
            .finish_non_exhaustive()
    }
}

impl Context {
    #[must_use]
    pub fn new(client: &Client, fips: FipsMode) -> Arc<Self> {
        Arc::new(Self {
            trust_stacks: Arc::new(KubeStore::<TrustStack>::new(client.clone())),
            timestamp_authorities: Arc::new(KubeStore::<TimestampAuthority>::new(client.clone())),
            transparency_logs: Arc::new(KubeStore::<TransparencyLog>::new(client.clone())),
            tree_logs: Arc::new(KubeStore::<TreeLog>::new(client.clone())),
            certificate_authorities: Arc::new(KubeStore::<CertificateAuthority>::new(client.clone())),
            metadata_services: Arc::new(KubeStore::<MetadataService>::new(client.clone())),
            secrets: Arc::new(KubeStore::<Secret>::new(client.clone())),
            fips,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        })
    }

}
