//! # Certificate Chain
//!
//! Issues the root → intermediate(s) → leaf chain for a timestamping
//! service.
//!
//! Custody is deliberately flat: the root signs every intermediate and the
//! leaf directly, rather than chaining intermediates to each other.
//! Intermediates and the leaf carry the timestamping extended key usage as
//! a critical, exclusive extension per RFC 3161.

use crate::pki::keys::{KeyMaterial, PkiError};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CustomExtension, DistinguishedName, DnType,
    IsCa, KeyUsagePurpose, SanType,
};
use time::{Duration, OffsetDateTime};

/// Validity periods per chain level (days)
const ROOT_VALIDITY_DAYS: i64 = 3650;
const INTERMEDIATE_VALIDITY_DAYS: i64 = 1825;
const LEAF_VALIDITY_DAYS: i64 = 365;

/// extKeyUsage (2.5.29.37)
const OID_EXTENDED_KEY_USAGE: &[u64] = &[2, 5, 29, 37];

/// DER-encoded `ExtendedKeyUsage { id-kp-timeStamping }`. Built as a custom
/// extension because the extension must be critical and rcgen's builtin
/// extended-key-usage list is emitted non-critical.
const EKU_TIME_STAMPING_DER: &[u8] = &[
    0x30, 0x0a, 0x06, 0x08, 0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x08,
];

/// Subject fields for one chain level
#[derive(Debug, Clone)]
pub struct CertificateSubject {
    pub common_name: String,
    pub organization: Option<String>,
    pub email: Option<String>,
}

impl CertificateSubject {
    #[must_use]
    pub fn named(common_name: &str) -> Self {
        Self {
            common_name: common_name.to_owned(),
            organization: None,
            email: None,
        }
    }
}

/// An issued chain, PEM-encoded leaf-first
#[derive(Debug, Clone)]
pub struct IssuedChain {
    pub root_pem: String,
    pub intermediate_pems: Vec<String>,
    pub leaf_pem: String,
}

impl IssuedChain {
    /// Full chain in trust order: leaf, intermediates, root
    #[must_use]
    pub fn chain_pem(&self) -> String {
        let mut chain = String::new();
        chain.push_str(&self.leaf_pem);
        for intermediate in &self.intermediate_pems {
            chain.push_str(intermediate);
        }
        chain.push_str(&self.root_pem);
        chain
    }
}

/// Issue the full chain from already resolved key material
pub fn issue_chain(
    root: &KeyMaterial,
    intermediates: &[(&KeyMaterial, CertificateSubject)],
    leaf: (&KeyMaterial, CertificateSubject),
    root_subject: &CertificateSubject,
) -> Result<IssuedChain, PkiError> {
    let root_params = ca_params(root_subject, ROOT_VALIDITY_DAYS, BasicConstraints::Unconstrained)?;
    let root_cert = root_params
        .self_signed(&root.key_pair)
        .map_err(PkiError::CertificateIssuance)?;

    let mut intermediate_pems = Vec::with_capacity(intermediates.len());
    for (material, subject) in intermediates {
        let mut params =
            ca_params(subject, INTERMEDIATE_VALIDITY_DAYS, BasicConstraints::Constrained(0))?;
        params.custom_extensions.push(timestamping_eku());
        let cert = sign_with_root(params, material, &root_cert, root)?;
        intermediate_pems.push(cert.pem());
    }

    let (leaf_material, leaf_subject) = leaf;
    let mut leaf_params = subject_params(&leaf_subject, LEAF_VALIDITY_DAYS)?;
    leaf_params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    leaf_params.custom_extensions.push(timestamping_eku());
    let leaf_cert = sign_with_root(leaf_params, leaf_material, &root_cert, root)?;

    Ok(IssuedChain {
        root_pem: root_cert.pem(),
        intermediate_pems,
        leaf_pem: leaf_cert.pem(),
    })
}

fn sign_with_root(
    params: CertificateParams,
    subject_material: &KeyMaterial,
    root_cert: &Certificate,
    root: &KeyMaterial,
) -> Result<Certificate, PkiError> {
    params
        .signed_by(&subject_material.key_pair, root_cert, &root.key_pair)
        .map_err(PkiError::CertificateIssuance)
}

fn ca_params(
    subject: &CertificateSubject,
    validity_days: i64,
    constraints: BasicConstraints,
) -> Result<CertificateParams, PkiError> {
    let mut params = subject_params(subject, validity_days)?;
    params.is_ca = IsCa::Ca(constraints);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];
    Ok(params)
}

fn subject_params(
    subject: &CertificateSubject,
    validity_days: i64,
) -> Result<CertificateParams, PkiError> {
    let mut params = CertificateParams::default();
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = params.not_before + Duration::days(validity_days);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, subject.common_name.as_str());
    if let Some(organization) = &subject.organization {
        distinguished_name.push(DnType::OrganizationName, organization.as_str());
    }
    params.distinguished_name = distinguished_name;

    if let Some(email) = &subject.email {
        let name = email
            .as_str()
            .try_into()
            .map_err(|_| PkiError::Encoding(format!("invalid e-mail address {email}")))?;
        params.subject_alt_names.push(SanType::Rfc822Name(name));
    }
    Ok(params)
}

fn timestamping_eku() -> CustomExtension {
    let mut extension =
        CustomExtension::from_oid_content(OID_EXTENDED_KEY_USAGE, EKU_TIME_STAMPING_DER.to_vec());
    extension.set_criticality(true);
    extension
}
