//! # Component Resources
//!
//! Custom resources for the remaining sub-systems of the trust
//! infrastructure. Each is created and supervised by the composite
//! `TrustStack` controller; realizing them into workloads is the job of
//! their own controllers and stays outside this crate's core.

use crate::crd::conditions::{Condition, ConditionedResource};
use crate::crd::signer::SecretKeySelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Certificate-transparency log front-end
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "trust-stack.io",
    version = "v1alpha1",
    kind = "TransparencyLog",
    namespaced,
    status = "TransparencyLogStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogSpec {
    /// Whether the log should be reachable from outside the cluster
    #[serde(default)]
    pub external_access: bool,
    /// Identifier of the backing Merkle tree; allocated by the tree-log
    /// backend when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<i64>,
    /// Operator-supplied log signing key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_ref: Option<SecretKeySelector>,
}

/// Status of a TransparencyLog resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// URL the log answers on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ConditionedResource for TransparencyLog {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self
            .status
            .get_or_insert_with(TransparencyLogStatus::default)
            .conditions
    }
}

/// Merkle-tree log backend
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "trust-stack.io",
    version = "v1alpha1",
    kind = "TreeLog",
    namespaced,
    status = "TreeLogStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TreeLogSpec {
    /// Reference to database credentials for the tree storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_secret_ref: Option<SecretKeySelector>,
}

/// Status of a TreeLog resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreeLogStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Identifier of the provisioned Merkle tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<i64>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ConditionedResource for TreeLog {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self
            .status
            .get_or_insert_with(TreeLogStatus::default)
            .conditions
    }
}

/// Code-signing certificate authority
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "trust-stack.io",
    version = "v1alpha1",
    kind = "CertificateAuthority",
    namespaced,
    status = "CertificateAuthorityStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthoritySpec {
    /// Whether the CA should be reachable from outside the cluster
    #[serde(default)]
    pub external_access: bool,
}

/// Status of a CertificateAuthority resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthorityStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// URL the CA answers on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ConditionedResource for CertificateAuthority {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self
            .status
            .get_or_insert_with(CertificateAuthorityStatus::default)
            .conditions
    }
}

/// Trust-metadata distribution service
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "trust-stack.io",
    version = "v1alpha1",
    kind = "MetadataService",
    namespaced,
    status = "MetadataServiceStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MetadataServiceSpec {
    /// Whether the distribution endpoint should be reachable from outside
    /// the cluster
    #[serde(default)]
    pub external_access: bool,
}

/// Status of a MetadataService resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataServiceStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// URL metadata is served from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ConditionedResource for MetadataService {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self
            .status
            .get_or_insert_with(MetadataServiceStatus::default)
            .conditions
    }
}
