//! # FIPS Validation
//!
//! Pure predicates rejecting non-compliant key material when the host runs
//! in FIPS mode.
//!
//! The compliance flag is read once from the kernel at process start and
//! injected as a value, never consulted as mutable global state; when it is
//! off every validator is a guaranteed no-op success. Each rejection is a
//! distinct error kind so callers can report *why* a secret was refused.

use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use spki::SubjectPublicKeyInfoRef;
use thiserror::Error;
use x509_cert::der::DecodePem;
use x509_cert::Certificate;

/// Minimum RSA modulus size accepted under FIPS
const MIN_RSA_BITS: usize = 2048;

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

const OID_CURVE_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_CURVE_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const OID_CURVE_P521: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// Approved curves: NIST P-256, P-384, P-521
const APPROVED_CURVES: &[ObjectIdentifier] = &[OID_CURVE_P256, OID_CURVE_P384, OID_CURVE_P521];

/// Approved certificate signature algorithms: SHA-256/384/512 with RSA,
/// RSASSA-PSS, or ECDSA
const APPROVED_SIGNATURE_ALGORITHMS: &[ObjectIdentifier] = &[
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11"), // sha256WithRSAEncryption
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12"), // sha384WithRSAEncryption
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13"), // sha512WithRSAEncryption
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10"), // RSASSA-PSS
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2"),   // ecdsa-with-SHA256
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3"),   // ecdsa-with-SHA384
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4"),   // ecdsa-with-SHA512
];

#[derive(Debug, Error)]
pub enum FipsError {
    #[error("invalid PEM block: {0}")]
    InvalidPem(String),
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    #[error("RSA key is {0} bits, FIPS requires at least {MIN_RSA_BITS}")]
    KeyTooSmall(usize),
    #[error("elliptic curve {0} is not FIPS approved")]
    NonCompliantCurve(String),
    #[error("signature algorithm {0} is not FIPS approved")]
    DisallowedSignatureAlgorithm(String),
    #[error("encrypted private key requires a password")]
    PasswordRequired,
    #[error("failed to decrypt private key with the supplied password")]
    DecryptFailed,
}

/// Process-wide FIPS compliance mode.
///
/// Constructed once in `main` from the kernel flag and injected wherever
/// key material enters the system; tests construct their own so there is no
/// cross-test interference.
#[derive(Debug, Clone, Copy)]
pub struct FipsMode {
    enabled: bool,
}

impl FipsMode {
    /// Read the kernel's FIPS flag. Absence of the flag means "off".
    #[must_use]
    pub fn from_host() -> Self {
        let enabled = std::fs::read_to_string("/proc/sys/crypto/fips_enabled")
            .map(|value| value.trim() == "1")
            .unwrap_or(false);
        Self { enabled }
    }

    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Validate a PEM private key, decrypting it first when the block is
    /// encrypted and a password was supplied
    pub fn validate_private_key_pem(
        &self,
        pem_data: &[u8],
        password: Option<&[u8]>,
    ) -> Result<(), FipsError> {
        if !self.enabled {
            return Ok(());
        }
        let block = pem::parse(pem_data).map_err(|e| FipsError::InvalidPem(e.to_string()))?;
        match block.tag() {
            "ENCRYPTED PRIVATE KEY" => {
                let password = password.ok_or(FipsError::PasswordRequired)?;
                let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(block.contents())
                    .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
                let document = encrypted
                    .decrypt(password)
                    .map_err(|_| FipsError::DecryptFailed)?;
                let info = pkcs8::PrivateKeyInfo::try_from(document.as_bytes())
                    .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
                validate_pkcs8(&info)
            }
            "PRIVATE KEY" => {
                let info = pkcs8::PrivateKeyInfo::try_from(block.contents())
                    .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
                validate_pkcs8(&info)
            }
            "EC PRIVATE KEY" => {
                let key = sec1::EcPrivateKey::from_der(block.contents())
                    .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
                let curve = key
                    .parameters
                    .and_then(sec1::EcParameters::named_curve)
                    .ok_or_else(|| {
                        FipsError::UnsupportedKeyType(
                            "EC private key without a named curve".to_string(),
                        )
                    })?;
                validate_curve(curve)
            }
            "RSA PRIVATE KEY" => {
                let key = rsa::RsaPrivateKey::from_pkcs1_der(block.contents())
                    .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
                validate_rsa_bits(key.size() * 8)
            }
            other => Err(FipsError::UnsupportedKeyType(other.to_string())),
        }
    }

    /// Validate a PEM public key
    pub fn validate_public_key_pem(&self, pem_data: &[u8]) -> Result<(), FipsError> {
        if !self.enabled {
            return Ok(());
        }
        let block = pem::parse(pem_data).map_err(|e| FipsError::InvalidPem(e.to_string()))?;
        match block.tag() {
            "PUBLIC KEY" => {
                let info = SubjectPublicKeyInfoRef::try_from(block.contents())
                    .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
                validate_public_key_info(
                    info.algorithm.oid,
                    info.algorithm.parameters.as_ref(),
                    info.subject_public_key.raw_bytes(),
                )
            }
            "RSA PUBLIC KEY" => {
                let key = rsa::RsaPublicKey::from_pkcs1_der(block.contents())
                    .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
                validate_rsa_bits(key.size() * 8)
            }
            other => Err(FipsError::UnsupportedKeyType(other.to_string())),
        }
    }

    /// Validate a PEM certificate: its signature algorithm must be on the
    /// approved list and its subject public key must itself be compliant
    pub fn validate_certificate_pem(&self, pem_data: &[u8]) -> Result<(), FipsError> {
        if !self.enabled {
            return Ok(());
        }
        let certificate =
            Certificate::from_pem(pem_data).map_err(|e| FipsError::InvalidPem(e.to_string()))?;

        let signature_oid = certificate.signature_algorithm.oid;
        if !APPROVED_SIGNATURE_ALGORITHMS.contains(&signature_oid) {
            return Err(FipsError::DisallowedSignatureAlgorithm(
                signature_oid.to_string(),
            ));
        }

        let spki = &certificate.tbs_certificate.subject_public_key_info;
        validate_public_key_info(
            spki.algorithm.oid,
            spki.algorithm.parameters.as_ref(),
            spki.subject_public_key.raw_bytes(),
        )
    }
}

fn validate_pkcs8(info: &pkcs8::PrivateKeyInfo<'_>) -> Result<(), FipsError> {
    let algorithm = info.algorithm.oid;
    if algorithm == OID_RSA_ENCRYPTION {
        // The PKCS#8 payload of an RSA key is a PKCS#1 RSAPrivateKey.
        let key = rsa::RsaPrivateKey::from_pkcs1_der(info.private_key)
            .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
        validate_rsa_bits(key.size() * 8)
    } else if algorithm == OID_EC_PUBLIC_KEY {
        let parameters = info.algorithm.parameters.as_ref().ok_or_else(|| {
            FipsError::UnsupportedKeyType("EC key without curve parameters".to_string())
        })?;
        validate_curve(decode_oid(parameters)?)
    } else if algorithm == OID_ED25519 {
        Err(FipsError::UnsupportedKeyType("Ed25519".to_string()))
    } else {
        Err(FipsError::UnsupportedKeyType(algorithm.to_string()))
    }
}

fn validate_public_key_info<P: Encode>(
    algorithm: ObjectIdentifier,
    parameters: Option<&P>,
    key_bytes: &[u8],
) -> Result<(), FipsError> {
    if algorithm == OID_RSA_ENCRYPTION {
        let key = rsa::RsaPublicKey::from_pkcs1_der(key_bytes)
            .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
        validate_rsa_bits(key.size() * 8)
    } else if algorithm == OID_EC_PUBLIC_KEY {
        let parameters = parameters.ok_or_else(|| {
            FipsError::UnsupportedKeyType("EC key without curve parameters".to_string())
        })?;
        validate_curve(decode_oid(parameters)?)
    } else if algorithm == OID_ED25519 {
        Err(FipsError::UnsupportedKeyType("Ed25519".to_string()))
    } else {
        Err(FipsError::UnsupportedKeyType(algorithm.to_string()))
    }
}

fn validate_rsa_bits(bits: usize) -> Result<(), FipsError> {
    if bits < MIN_RSA_BITS {
        return Err(FipsError::KeyTooSmall(bits));
    }
    Ok(())
}

fn validate_curve(curve: ObjectIdentifier) -> Result<(), FipsError> {
    if APPROVED_CURVES.contains(&curve) {
        return Ok(());
    }
    Err(FipsError::NonCompliantCurve(curve_name(curve)))
}

/// Round-trip an ASN.1 `parameters` value through DER to read it as an OID
fn decode_oid<P: Encode>(parameters: &P) -> Result<ObjectIdentifier, FipsError> {
    let encoded = parameters
        .to_der()
        .map_err(|e| FipsError::InvalidPem(e.to_string()))?;
    ObjectIdentifier::from_der(&encoded)
        .map_err(|_| FipsError::UnsupportedKeyType("non-OID curve parameters".to_string()))
}

fn curve_name(oid: ObjectIdentifier) -> String {
    match oid.to_string().as_str() {
        "1.3.132.0.33" => "P-224".to_string(),
        "1.3.132.0.10" => "secp256k1".to_string(),
        other => other.to_string(),
    }
}
