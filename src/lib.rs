//! # Trust Stack Operator Library
//!
//! Kubernetes operator provisioning a code-signing trust infrastructure: a
//! timestamping authority, a certificate-transparency log, a Merkle-tree
//! log backend, a certificate authority, and a metadata-distribution
//! service, composed and supervised by a single `TrustStack` resource.
//!
//! The crate is organized around a small reconciliation engine (`engine`),
//! the CRD types it drives (`crd`), the PKI chain provisioning and FIPS
//! validation logic (`pki`), and one pipeline-based controller per resource
//! kind (`controller`).

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod engine;
pub mod observability;
pub mod pki;
pub mod runtime;
pub mod server;

// Re-export the resource types most callers need
pub use crd::{
    CertificateAuthority, MetadataService, TimestampAuthority, TransparencyLog, TreeLog, TrustStack,
};
