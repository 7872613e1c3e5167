//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `trust_stack_reconciliations_total` - Total reconciliations per kind
//! - `trust_stack_reconciliation_errors_total` - Reconciliation errors per kind
//! - `trust_stack_reconciliation_duration_seconds` - Reconciliation duration
//! - `trust_stack_signer_rotations_total` - Signer certificate chain rotations
//! - `trust_stack_signer_failures_total` - Failed signer resolutions

use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "trust_stack_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "trust_stack_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "trust_stack_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static SIGNER_ROTATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "trust_stack_signer_rotations_total",
        "Total number of signer certificate chain rotations",
    )
    .expect("Failed to create SIGNER_ROTATIONS_TOTAL metric - this should never happen")
});

static SIGNER_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "trust_stack_signer_failures_total",
        "Total number of failed signer resolutions",
    )
    .expect("Failed to create SIGNER_FAILURES_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry. Called once at startup.
pub fn register() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECONCILIATIONS_TOTAL.clone()),
        Box::new(RECONCILIATION_ERRORS_TOTAL.clone()),
        Box::new(RECONCILIATION_DURATION.clone()),
        Box::new(SIGNER_ROTATIONS_TOTAL.clone()),
        Box::new(SIGNER_FAILURES_TOTAL.clone()),
    ];
    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            tracing::warn!("Failed to register metric: {e}");
        }
    }
}

/// Gather all metrics in the Prometheus text exposition format
#[must_use]
pub fn gather() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {e}");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(seconds: f64) {
    RECONCILIATION_DURATION.observe(seconds);
}

pub fn increment_signer_rotations() {
    SIGNER_ROTATIONS_TOTAL.inc();
}

pub fn increment_signer_failures() {
    SIGNER_FAILURES_TOTAL.inc();
}
