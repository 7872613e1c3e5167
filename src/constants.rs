//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group served by every custom resource of this operator
pub const API_GROUP: &str = "trust-stack.io";

/// Annotation that pauses reconciliation of an owned child object.
/// Only the exact value `"true"` pauses; anything else is treated as active.
pub const PAUSE_ANNOTATION: &str = "trust-stack.io/pause-reconciliation";

/// Label stamped on secrets generated by the chain provisioner.
/// The value is the name of the owning resource, which scopes the
/// delete-before-create rotation to that resource's own secrets.
pub const SIGNER_CONFIG_LABEL: &str = "trust-stack.io/signer-config";

/// Annotations copied from a parent resource onto its owned children.
/// Everything not named here is dropped so internal bookkeeping annotations
/// never leak into child objects.
pub const INHERITED_ANNOTATIONS: &[&str] = &[
    "trust-stack.io/proxy-config",
    "trust-stack.io/trusted-ca",
    "trust-stack.io/network-policy",
];

/// Labels copied from a parent resource onto its owned children
pub const INHERITED_LABELS: &[&str] = &[
    "app.kubernetes.io/instance",
    "app.kubernetes.io/part-of",
];

/// Condition type carried by every resource
pub const CONDITION_READY: &str = "Ready";

/// Dependency condition for the timestamp authority's certificate chain
pub const CONDITION_CERT_CHAIN: &str = "CertificateChainAvailable";

/// Dependency condition types tracked on the composite resource
pub const CONDITION_TIMESTAMP_AUTHORITY: &str = "TimestampAuthorityAvailable";
pub const CONDITION_TRANSPARENCY_LOG: &str = "TransparencyLogAvailable";
pub const CONDITION_TREE_LOG: &str = "TreeLogAvailable";
pub const CONDITION_CERTIFICATE_AUTHORITY: &str = "CertificateAuthorityAvailable";
pub const CONDITION_METADATA_SERVICE: &str = "MetadataServiceAvailable";

/// Requeue delay after a detected optimistic-concurrency conflict (seconds).
/// Short on purpose: the next pass re-reads fresh state and usually succeeds.
pub const CONFLICT_REQUEUE_SECS: u64 = 1;

/// Requeue delay after a transient failure (seconds)
pub const TRANSIENT_REQUEUE_SECS: u64 = 5;

/// Requeue delay while signer key material cannot be resolved yet (seconds).
/// Key secrets are often created by an external actor after the resource.
pub const SIGNER_RETRY_REQUEUE_SECS: u64 = 5;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default delay before restarting the watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default exponential backoff starting value for watch errors (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch errors (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Reconciliation error backoff bounds (minutes, Fibonacci sequence)
pub const DEFAULT_ERROR_BACKOFF_MIN_MINUTES: u64 = 1;
pub const DEFAULT_ERROR_BACKOFF_MAX_MINUTES: u64 = 10;

/// Secret keys used inside a provisioned signer bundle
pub const SECRET_KEY_ROOT_PRIVATE_KEY: &str = "rootPrivateKey";
pub const SECRET_KEY_ROOT_PASSWORD: &str = "rootPrivateKeyPassword";
pub const SECRET_KEY_LEAF_PRIVATE_KEY: &str = "leafPrivateKey";
pub const SECRET_KEY_LEAF_PASSWORD: &str = "leafPrivateKeyPassword";
pub const SECRET_KEY_CERTIFICATE_CHAIN: &str = "certificateChain";

/// Secret key for the n-th intermediate private key
#[must_use]
pub fn intermediate_key_name(index: usize) -> String {
    format!("intermediatePrivateKey-{index}")
}

/// Secret key for the n-th intermediate key password
#[must_use]
pub fn intermediate_password_name(index: usize) -> String {
    format!("intermediatePrivateKeyPassword-{index}")
}
