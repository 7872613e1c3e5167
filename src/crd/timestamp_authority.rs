//! # TimestampAuthority
//!
//! Custom resource for the RFC 3161 timestamping service. Its controller is
//! the main consumer of the certificate-chain provisioner: the signer
//! configuration below describes the chain, and the resolved counterpart in
//! status records where every piece was materialized.

use crate::crd::conditions::{Condition, ConditionedResource};
use crate::crd::signer::SignerConfig;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// TimestampAuthority Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: trust-stack.io/v1alpha1
/// kind: TimestampAuthority
/// metadata:
///   name: tsa
///   namespace: trust-stack
/// spec:
///   signer:
///     certificateChain:
///       rootCA:
///         organizationName: Example Org
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "trust-stack.io",
    version = "v1alpha1",
    kind = "TimestampAuthority",
    namespaced,
    status = "TimestampAuthorityStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TimestampAuthoritySpec {
    /// Signer certificate chain configuration. An empty signer means
    /// "generate everything": root, one intermediate, and the leaf.
    #[serde(default)]
    pub signer: SignerConfig,
    /// Whether the service should be reachable from outside the cluster
    #[serde(default)]
    pub external_access: bool,
}

/// Status of a TimestampAuthority resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimestampAuthorityStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Signer configuration as last resolved by the chain provisioner.
    /// Holds secret references only, never key material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<SignerConfig>,
    /// URL the timestamping service answers on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ConditionedResource for TimestampAuthority {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self
            .status
            .get_or_insert_with(TimestampAuthorityStatus::default)
            .conditions
    }
}
