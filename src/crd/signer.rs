//! # Signer Configuration
//!
//! Certificate-chain signer configuration shared between spec (desired
//! intent) and status (what was actually materialized).
//!
//! The same types appear on both sides on purpose: rotation-need detection
//! compares the two with *structural derivation*: every field explicitly set
//! in spec must already match status, while unset spec fields are "don't
//! care". Status never carries raw key material, only secret references.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a single key inside a Kubernetes secret
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Name of the secret
    pub name: String,
    /// Key within the secret's data
    pub key: String,
}

impl SecretKeySelector {
    #[must_use]
    pub fn new(name: &str, key: &str) -> Self {
        Self {
            name: name.to_owned(),
            key: key.to_owned(),
        }
    }
}

/// Signer configuration of a timestamping service
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignerConfig {
    /// Certificate chain configuration
    #[serde(default)]
    pub certificate_chain: CertificateChainConfig,
}

/// Configuration of the root → intermediate(s) → leaf certificate chain
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateChainConfig {
    /// Reference to a complete, externally managed PEM certificate chain.
    /// When set, no certificates are issued; the referenced chain is loaded
    /// and validated instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_chain_ref: Option<SecretKeySelector>,
    /// Root certificate authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_ca: Option<CertificateAuthoritySettings>,
    /// Intermediate certificate authorities, all signed by the root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intermediate_ca: Vec<CertificateAuthoritySettings>,
    /// Leaf certificate used by the signing service itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_ca: Option<CertificateAuthoritySettings>,
}

/// One level of the certificate chain
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthoritySettings {
    /// Subject common name; defaulted per level when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    /// Subject organization name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    /// Contact e-mail, recorded as a subject alternative name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_email: Option<String>,
    /// Reference to an operator-supplied private key (PEM). When unset a
    /// fresh P-384 key pair is generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_ref: Option<SecretKeySelector>,
    /// Reference to the password of an encrypted private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_ref: Option<SecretKeySelector>,
}

/// "Set fields must match, unset fields are don't care"
fn derives<T>(spec: &Option<T>, resolved: &Option<T>, matches: impl Fn(&T, &T) -> bool) -> bool {
    match (spec, resolved) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => matches(a, b),
    }
}

impl SignerConfig {
    /// Whether this spec structurally derives from an already resolved
    /// configuration. When it does, the provisioner has nothing to do.
    #[must_use]
    pub fn derives_from(&self, resolved: &SignerConfig) -> bool {
        self.certificate_chain
            .derives_from(&resolved.certificate_chain)
    }
}

impl CertificateChainConfig {
    fn derives_from(&self, resolved: &CertificateChainConfig) -> bool {
        if !derives(
            &self.certificate_chain_ref,
            &resolved.certificate_chain_ref,
            PartialEq::eq,
        ) {
            return false;
        }
        if !derives(
            &self.root_ca,
            &resolved.root_ca,
            CertificateAuthoritySettings::derives_from,
        ) {
            return false;
        }
        if !derives(
            &self.leaf_ca,
            &resolved.leaf_ca,
            CertificateAuthoritySettings::derives_from,
        ) {
            return false;
        }
        // An empty intermediate list in spec defers to whatever was resolved.
        if self.intermediate_ca.is_empty() {
            return true;
        }
        self.intermediate_ca.len() == resolved.intermediate_ca.len()
            && self
                .intermediate_ca
                .iter()
                .zip(resolved.intermediate_ca.iter())
                .all(|(spec, resolved)| spec.derives_from(resolved))
    }
}

impl CertificateAuthoritySettings {
    fn derives_from(&self, resolved: &CertificateAuthoritySettings) -> bool {
        derives(&self.common_name, &resolved.common_name, PartialEq::eq)
            && derives(
                &self.organization_name,
                &resolved.organization_name,
                PartialEq::eq,
            )
            && derives(
                &self.organization_email,
                &resolved.organization_email,
                PartialEq::eq,
            )
            && derives(
                &self.private_key_ref,
                &resolved.private_key_ref,
                PartialEq::eq,
            )
            && derives(&self.password_ref, &resolved.password_ref, PartialEq::eq)
    }
}
