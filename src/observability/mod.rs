//! # Observability
//!
//! Prometheus metrics; the HTTP exposition lives in `crate::server`.

pub mod metrics;
