//! # Custom Resource Definitions
//!
//! CRD types for the Trust Stack Operator.
//!
//! ## Module Structure
//!
//! - `trust_stack.rs` - Composite resource composing the five sub-systems
//! - `timestamp_authority.rs` - Timestamping authority resource
//! - `components.rs` - Transparency log, tree log, CA, metadata service
//! - `signer.rs` - Signer configuration and structural derivation
//! - `conditions.rs` - Conditions, phases, and aggregation

pub mod components;
pub mod conditions;
pub mod signer;
pub mod timestamp_authority;
pub mod trust_stack;

// Re-export all public types
pub use components::{
    CertificateAuthority, CertificateAuthoritySpec, CertificateAuthorityStatus, MetadataService,
    MetadataServiceSpec, MetadataServiceStatus, TransparencyLog, TransparencyLogSpec,
    TransparencyLogStatus, TreeLog, TreeLogSpec, TreeLogStatus,
};
pub use conditions::{
    aggregate, find_condition, set_condition, Aggregate, Condition, ConditionedResource, Phase,
};
pub use signer::{
    CertificateAuthoritySettings, CertificateChainConfig, SecretKeySelector, SignerConfig,
};
pub use timestamp_authority::{
    TimestampAuthority, TimestampAuthoritySpec, TimestampAuthorityStatus,
};
pub use trust_stack::{TrustStack, TrustStackSpec, TrustStackStatus};
