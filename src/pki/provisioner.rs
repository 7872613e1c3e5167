//! # Chain Provisioner
//!
//! Materializes the signer configuration of a timestamping service: resolves
//! or generates the key material for every chain level, issues the
//! certificates, and assembles the single bundle secret that carries all of
//! it.
//!
//! The provisioner is a no-op whenever the spec already structurally derives
//! from the last resolved configuration in status; anything else triggers a
//! full re-resolution. Nothing is written here on failure: either the whole
//! bundle materializes or none of it does.

use crate::constants;
use crate::crd::signer::{
    CertificateAuthoritySettings, CertificateChainConfig, SecretKeySelector, SignerConfig,
};
use crate::engine::store::{ObjectStore, StoreError};
use crate::pki::chain::{issue_chain, CertificateSubject};
use crate::pki::fips::FipsMode;
use crate::pki::keys::{KeyMaterial, PkiError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Default subject common names per chain level
const DEFAULT_ROOT_CN: &str = "Timestamp Authority Root CA";
const DEFAULT_INTERMEDIATE_CN: &str = "Timestamp Authority Intermediate CA";
const DEFAULT_LEAF_CN: &str = "Timestamp Authority";

/// Result of one successful provisioning pass
#[derive(Debug)]
pub struct ProvisionedSigner {
    /// Bundle secret ready to be created, marker label and owner reference
    /// already stamped
    pub secret: Secret,
    /// Configuration to record in status: the spec's own fields plus
    /// references into the bundle for everything that was generated
    pub resolved: SignerConfig,
}

/// Builds and rotates the certificate chain bundle for one resource
pub struct ChainProvisioner<'a> {
    secrets: &'a dyn ObjectStore<Secret>,
    fips: FipsMode,
    namespace: &'a str,
    owner_name: &'a str,
}

impl std::fmt::Debug for ChainProvisioner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainProvisioner")
            .field("namespace", &self.namespace)
            .field("owner_name", &self.owner_name)
            .finish_non_exhaustive()
    }
}

impl<'a> ChainProvisioner<'a> {
    #[must_use]
    pub fn new(
        secrets: &'a dyn ObjectStore<Secret>,
        fips: FipsMode,
        namespace: &'a str,
        owner_name: &'a str,
    ) -> Self {
        Self {
            secrets,
            fips,
            namespace,
            owner_name,
        }
    }

    /// Whether the spec requires a (re-)resolution. False exactly when the
    /// spec structurally derives from the last resolved configuration.
    #[must_use]
    pub fn needs_resolution(spec: &SignerConfig, resolved: Option<&SignerConfig>) -> bool {
        match resolved {
            Some(resolved) => !spec.derives_from(resolved),
            None => true,
        }
    }

    /// Label selector matching every bundle secret previously generated for
    /// this resource
    #[must_use]
    pub fn marker_selector(&self) -> String {
        format!("{}={}", constants::SIGNER_CONFIG_LABEL, self.owner_name)
    }

    /// Resolve the whole signer configuration into a new bundle secret.
    ///
    /// The bundle name embeds the owning resource's name plus a fresh
    /// suffix, so rotation always lands in a new secret and a crash mid-way
    /// can never corrupt the bundle a running deployment mounts.
    pub async fn materialize(
        &self,
        spec: &SignerConfig,
        owner_ref: OwnerReference,
    ) -> Result<ProvisionedSigner, PkiError> {
        let suffix = Uuid::new_v4().simple().to_string();
        let secret_name = format!("{}-signer-config-{}", self.owner_name, &suffix[..8]);

        let (data, resolved) = match &spec.certificate_chain.certificate_chain_ref {
            Some(chain_ref) => self.load_supplied_chain(spec, chain_ref).await?,
            None => self.issue_fresh_chain(spec, &secret_name).await?,
        };

        let labels = BTreeMap::from([
            (
                constants::SIGNER_CONFIG_LABEL.to_string(),
                self.owner_name.to_string(),
            ),
            (
                "app.kubernetes.io/managed-by".to_string(),
                "trust-stack-operator".to_string(),
            ),
        ]);
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name),
                namespace: Some(self.namespace.to_string()),
                labels: Some(labels),
                owner_references: Some(vec![owner_ref]),
                ..ObjectMeta::default()
            },
            data: Some(data),
            type_: Some("Opaque".to_string()),
            ..Secret::default()
        };

        Ok(ProvisionedSigner { secret, resolved })
    }

    /// A complete chain was supplied by reference: load and validate it,
    /// skip issuance entirely
    async fn load_supplied_chain(
        &self,
        spec: &SignerConfig,
        chain_ref: &SecretKeySelector,
    ) -> Result<(BTreeMap<String, ByteString>, SignerConfig), PkiError> {
        let chain_bytes = self.resolve(chain_ref).await?;
        let blocks = pem::parse_many(&chain_bytes)
            .map_err(|e| PkiError::InvalidKey(format!("certificate chain: {e}")))?;
        let mut certificates = 0;
        for block in &blocks {
            if block.tag() != "CERTIFICATE" {
                continue;
            }
            certificates += 1;
            self.fips
                .validate_certificate_pem(pem::encode(block).as_bytes())?;
        }
        if certificates == 0 {
            return Err(PkiError::InvalidKey(
                "referenced certificate chain contains no certificates".to_string(),
            ));
        }
        debug!(
            secret = %chain_ref.name,
            "using externally supplied certificate chain"
        );

        let data = BTreeMap::from([(
            constants::SECRET_KEY_CERTIFICATE_CHAIN.to_string(),
            ByteString(chain_bytes),
        )]);
        // Status mirrors the spec verbatim so the next pass derives cleanly.
        Ok((data, spec.clone()))
    }

    /// Resolve or generate every level's key, then issue the chain with the
    /// root signing each intermediate and the leaf
    async fn issue_fresh_chain(
        &self,
        spec: &SignerConfig,
        secret_name: &str,
    ) -> Result<(BTreeMap<String, ByteString>, SignerConfig), PkiError> {
        let chain_spec = &spec.certificate_chain;
        let root_settings = chain_spec.root_ca.clone().unwrap_or_default();
        let leaf_settings = chain_spec.leaf_ca.clone().unwrap_or_default();
        // One generated intermediate unless the spec pins its own list.
        let intermediate_settings: Vec<CertificateAuthoritySettings> =
            if chain_spec.intermediate_ca.is_empty() {
                vec![CertificateAuthoritySettings::default()]
            } else {
                chain_spec.intermediate_ca.clone()
            };

        let root = self.resolve_material(&root_settings).await?;
        let leaf = self.resolve_material(&leaf_settings).await?;
        let mut intermediates = Vec::with_capacity(intermediate_settings.len());
        for settings in &intermediate_settings {
            intermediates.push(self.resolve_material(settings).await?);
        }

        let root_subject = subject(&root_settings, DEFAULT_ROOT_CN);
        let intermediate_pairs: Vec<(&KeyMaterial, CertificateSubject)> = intermediates
            .iter()
            .zip(intermediate_settings.iter())
            .map(|(material, settings)| (material, subject(settings, DEFAULT_INTERMEDIATE_CN)))
            .collect();
        let chain = issue_chain(
            &root,
            &intermediate_pairs,
            (&leaf, subject(&leaf_settings, DEFAULT_LEAF_CN)),
            &root_subject,
        )?;

        let mut data = BTreeMap::new();
        data.insert(
            constants::SECRET_KEY_ROOT_PRIVATE_KEY.to_string(),
            ByteString(root.private_key_pem.to_vec()),
        );
        if !root.password.is_empty() {
            data.insert(
                constants::SECRET_KEY_ROOT_PASSWORD.to_string(),
                ByteString(root.password.to_vec()),
            );
        }
        for (index, material) in intermediates.iter().enumerate() {
            data.insert(
                constants::intermediate_key_name(index),
                ByteString(material.private_key_pem.to_vec()),
            );
            if !material.password.is_empty() {
                data.insert(
                    constants::intermediate_password_name(index),
                    ByteString(material.password.to_vec()),
                );
            }
        }
        data.insert(
            constants::SECRET_KEY_LEAF_PRIVATE_KEY.to_string(),
            ByteString(leaf.private_key_pem.to_vec()),
        );
        if !leaf.password.is_empty() {
            data.insert(
                constants::SECRET_KEY_LEAF_PASSWORD.to_string(),
                ByteString(leaf.password.to_vec()),
            );
        }
        data.insert(
            constants::SECRET_KEY_CERTIFICATE_CHAIN.to_string(),
            ByteString(chain.chain_pem().into_bytes()),
        );

        let resolved = SignerConfig {
            certificate_chain: CertificateChainConfig {
                certificate_chain_ref: Some(SecretKeySelector::new(
                    secret_name,
                    constants::SECRET_KEY_CERTIFICATE_CHAIN,
                )),
                root_ca: Some(resolved_settings(
                    &root_settings,
                    &root,
                    DEFAULT_ROOT_CN,
                    secret_name,
                    constants::SECRET_KEY_ROOT_PRIVATE_KEY,
                    constants::SECRET_KEY_ROOT_PASSWORD,
                )),
                intermediate_ca: intermediate_settings
                    .iter()
                    .zip(intermediates.iter())
                    .enumerate()
                    .map(|(index, (settings, material))| {
                        resolved_settings(
                            settings,
                            material,
                            DEFAULT_INTERMEDIATE_CN,
                            secret_name,
                            &constants::intermediate_key_name(index),
                            &constants::intermediate_password_name(index),
                        )
                    })
                    .collect(),
                leaf_ca: Some(resolved_settings(
                    &leaf_settings,
                    &leaf,
                    DEFAULT_LEAF_CN,
                    secret_name,
                    constants::SECRET_KEY_LEAF_PRIVATE_KEY,
                    constants::SECRET_KEY_LEAF_PASSWORD,
                )),
            },
        };

        Ok((data, resolved))
    }

    async fn resolve_material(
        &self,
        settings: &CertificateAuthoritySettings,
    ) -> Result<KeyMaterial, PkiError> {
        let Some(key_ref) = &settings.private_key_ref else {
            return KeyMaterial::generate();
        };
        let pem_bytes = self.resolve(key_ref).await?;
        let password = match &settings.password_ref {
            Some(password_ref) => Some(self.resolve(password_ref).await?),
            None => None,
        };
        self.fips
            .validate_private_key_pem(&pem_bytes, password.as_deref())?;
        KeyMaterial::from_supplied(
            &pem_bytes,
            password.as_deref(),
            key_ref.clone(),
            settings.password_ref.clone(),
        )
    }

    /// Load one (secret, key) reference from the secret store
    async fn resolve(&self, key_ref: &SecretKeySelector) -> Result<Vec<u8>, PkiError> {
        let secret = self
            .secrets
            .get(self.namespace, &key_ref.name)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => PkiError::SecretNotFound(key_ref.name.clone()),
                other => PkiError::Store(anyhow::Error::new(other)),
            })?
            .ok_or_else(|| PkiError::SecretNotFound(key_ref.name.clone()))?;
        secret
            .data
            .as_ref()
            .and_then(|data| data.get(&key_ref.key))
            .map(|ByteString(bytes)| bytes.clone())
            .or_else(|| {
                secret
                    .string_data
                    .as_ref()
                    .and_then(|data| data.get(&key_ref.key))
                    .map(|value| value.clone().into_bytes())
            })
            .ok_or_else(|| PkiError::MissingSecretKey {
                name: key_ref.name.clone(),
                key: key_ref.key.clone(),
            })
    }
}

fn subject(settings: &CertificateAuthoritySettings, default_cn: &str) -> CertificateSubject {
    CertificateSubject {
        common_name: settings
            .common_name
            .clone()
            .unwrap_or_else(|| default_cn.to_string()),
        organization: settings.organization_name.clone(),
        email: settings.organization_email.clone(),
    }
}

/// Status-side settings for one level: the spec's fields verbatim, with
/// bundle references filled in for everything the spec left open
fn resolved_settings(
    settings: &CertificateAuthoritySettings,
    material: &KeyMaterial,
    default_cn: &str,
    secret_name: &str,
    key_name: &str,
    password_name: &str,
) -> CertificateAuthoritySettings {
    CertificateAuthoritySettings {
        common_name: settings
            .common_name
            .clone()
            .or_else(|| Some(default_cn.to_string())),
        organization_name: settings.organization_name.clone(),
        organization_email: settings.organization_email.clone(),
        private_key_ref: settings
            .private_key_ref
            .clone()
            .or_else(|| Some(SecretKeySelector::new(secret_name, key_name))),
        password_ref: settings.password_ref.clone().or_else(|| {
            (!material.password.is_empty())
                .then(|| SecretKeySelector::new(secret_name, password_name))
        }),
    }
}
