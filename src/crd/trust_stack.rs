//! # TrustStack
//!
//! Composite custom resource that composes the five sub-systems of the
//! trust infrastructure. Its controller creates one child custom resource
//! per configured component and mirrors each child's readiness into its own
//! dependency conditions; the aggregate `Ready` condition is the minimum
//! phase among them.

use crate::crd::components::{
    CertificateAuthoritySpec, MetadataServiceSpec, TransparencyLogSpec, TreeLogSpec,
};
use crate::crd::conditions::{Condition, ConditionedResource};
use crate::crd::timestamp_authority::TimestampAuthoritySpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// TrustStack Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: trust-stack.io/v1alpha1
/// kind: TrustStack
/// metadata:
///   name: trust-stack
///   namespace: trust-stack
/// spec:
///   timestampAuthority:
///     signer: {}
///   treeLog: {}
///   transparencyLog: {}
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "trust-stack.io",
    version = "v1alpha1",
    kind = "TrustStack",
    namespaced,
    status = "TrustStackStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TrustStackSpec {
    /// Timestamping authority; omit to run without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_authority: Option<TimestampAuthoritySpec>,
    /// Certificate-transparency log front-end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency_log: Option<TransparencyLogSpec>,
    /// Merkle-tree log backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_log: Option<TreeLogSpec>,
    /// Code-signing certificate authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<CertificateAuthoritySpec>,
    /// Trust-metadata distribution service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_service: Option<MetadataServiceSpec>,
}

/// Status of a TrustStack resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrustStackStatus {
    /// Aggregate and per-dependency conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ConditionedResource for TrustStack {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self
            .status
            .get_or_insert_with(TrustStackStatus::default)
            .conditions
    }
}
