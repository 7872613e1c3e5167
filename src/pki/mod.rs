//! # PKI
//!
//! Certificate-chain provisioning and FIPS compliance validation.
//!
//! ## Module Structure
//!
//! - `keys.rs` - Key generation, encrypted PKCS#8 handling
//! - `chain.rs` - Certificate issuance (flat root-signs-all custody)
//! - `provisioner.rs` - Resolution, rotation, and bundle assembly
//! - `fips.rs` - Compliance predicates over PEM key material

pub mod chain;
pub mod fips;
pub mod keys;
pub mod provisioner;

pub use chain::{CertificateSubject, IssuedChain};
pub use fips::{FipsError, FipsMode};
pub use keys::{KeyMaterial, KeySource, PkiError};
pub use provisioner::{ChainProvisioner, ProvisionedSigner};
