//! # Key Material
//!
//! Generation and loading of private keys for the certificate chain.
//!
//! Generated keys are P-384 with a random password; the key is persisted as
//! an encrypted PKCS#8 PEM block and the password alongside it, so a later
//! pass (or an operator) can load the material back with nothing but the
//! secret contents.

use crate::crd::signer::SecretKeySelector;
use crate::pki::fips::FipsError;
use pkcs8::LineEnding;
use rcgen::KeyPair;
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum PkiError {
    #[error("failed to generate key pair: {0}")]
    KeyGeneration(#[source] rcgen::Error),
    #[error("failed to issue certificate: {0}")]
    CertificateIssuance(#[source] rcgen::Error),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("encrypted private key requires a password")]
    PasswordRequired,
    #[error("failed to decrypt private key with the supplied password")]
    DecryptFailed,
    #[error("failed to encode private key: {0}")]
    Encoding(String),
    #[error("referenced secret {0} not found")]
    SecretNotFound(String),
    #[error("secret {name} has no key {key}")]
    MissingSecretKey { name: String, key: String },
    #[error(transparent)]
    Fips(#[from] FipsError),
    #[error("secret store request failed: {0}")]
    Store(#[source] anyhow::Error),
}

/// Where one chain level's key came from
#[derive(Debug, Clone)]
pub enum KeySource {
    Generated,
    Referenced {
        key_ref: SecretKeySelector,
        password_ref: Option<SecretKeySelector>,
    },
}

/// One resolved private key: the signing handle plus exactly what will be
/// persisted into the bundle secret
pub struct KeyMaterial {
    pub key_pair: KeyPair,
    /// PEM as it will be stored; encrypted PKCS#8 for generated keys,
    /// verbatim operator-supplied bytes otherwise
    pub private_key_pem: Zeroizing<Vec<u8>>,
    /// Password for the stored PEM; empty when the key is unencrypted
    pub password: Zeroizing<Vec<u8>>,
    pub source: KeySource,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("source", &self.source)
            .field("private_key_pem", &"***")
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Generate a fresh P-384 key pair with a random password, stored as an
    /// encrypted PKCS#8 PEM block
    pub fn generate() -> Result<Self, PkiError> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384)
            .map_err(PkiError::KeyGeneration)?;
        let password = Zeroizing::new(Uuid::new_v4().simple().to_string().into_bytes());
        let private_key_pem = encrypt_pkcs8(&key_pair.serialize_der(), &password)?;
        Ok(Self {
            key_pair,
            private_key_pem,
            password,
            source: KeySource::Generated,
        })
    }

    /// Load operator-supplied key material, keeping the original bytes for
    /// persistence
    pub fn from_supplied(
        pem_data: &[u8],
        password: Option<&[u8]>,
        key_ref: SecretKeySelector,
        password_ref: Option<SecretKeySelector>,
    ) -> Result<Self, PkiError> {
        let key_pair = load_key_pair(pem_data, password)?;
        Ok(Self {
            key_pair,
            private_key_pem: Zeroizing::new(pem_data.to_vec()),
            password: Zeroizing::new(password.map(<[u8]>::to_vec).unwrap_or_default()),
            source: KeySource::Referenced {
                key_ref,
                password_ref,
            },
        })
    }
}

/// Parse a PKCS#8 private key PEM block, decrypting it first when needed
pub fn load_key_pair(pem_data: &[u8], password: Option<&[u8]>) -> Result<KeyPair, PkiError> {
    let block = pem::parse(pem_data).map_err(|e| PkiError::InvalidKey(e.to_string()))?;
    match block.tag() {
        "ENCRYPTED PRIVATE KEY" => {
            let password = password.ok_or(PkiError::PasswordRequired)?;
            let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(block.contents())
                .map_err(|e| PkiError::InvalidKey(e.to_string()))?;
            let document = encrypted
                .decrypt(password)
                .map_err(|_| PkiError::DecryptFailed)?;
            KeyPair::try_from(document.as_bytes()).map_err(|e| PkiError::InvalidKey(e.to_string()))
        }
        "PRIVATE KEY" => {
            KeyPair::try_from(block.contents()).map_err(|e| PkiError::InvalidKey(e.to_string()))
        }
        other => Err(PkiError::InvalidKey(format!(
            "unsupported PEM block \"{other}\", expected a PKCS#8 private key"
        ))),
    }
}

/// Encrypt a PKCS#8 DER private key under a password (PBES2)
fn encrypt_pkcs8(der_bytes: &[u8], password: &[u8]) -> Result<Zeroizing<Vec<u8>>, PkiError> {
    let info = pkcs8::PrivateKeyInfo::try_from(der_bytes)
        .map_err(|e| PkiError::Encoding(e.to_string()))?;
    let document = info
        .encrypt(rand_core::OsRng, password)
        .map_err(|e| PkiError::Encoding(e.to_string()))?;
    let pem = document
        .to_pem("ENCRYPTED PRIVATE KEY", LineEnding::LF)
        .map_err(|e| PkiError::Encoding(e.to_string()))?;
    Ok(Zeroizing::new(pem.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_round_trips_through_encrypted_pem() {
        let material = KeyMaterial::generate().unwrap();
        assert!(matches!(material.source, KeySource::Generated));
        assert!(!material.password.is_empty());

        let reloaded =
            load_key_pair(&material.private_key_pem, Some(material.password.as_slice())).unwrap();
        assert_eq!(
            reloaded.public_key_der(),
            material.key_pair.public_key_der()
        );
    }

    #[test]
    fn test_encrypted_key_requires_password() {
        let material = KeyMaterial::generate().unwrap();
        let err = load_key_pair(&material.private_key_pem, None).unwrap_err();
        assert!(matches!(err, PkiError::PasswordRequired));
    }

    #[test]
    fn test_wrong_password_fails_distinctly() {
        let material = KeyMaterial::generate().unwrap();
        let err = load_key_pair(&material.private_key_pem, Some(b"wrong")).unwrap_err();
        assert!(matches!(err, PkiError::DecryptFailed));
    }

    #[test]
    fn test_plain_pkcs8_loads_without_password() {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384).unwrap();
        let pem = key_pair.serialize_pem();
        let reloaded = load_key_pair(pem.as_bytes(), None).unwrap();
        assert_eq!(reloaded.public_key_der(), key_pair.public_key_der());
    }
}
