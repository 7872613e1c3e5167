//! # Controllers
//!
//! One reconciler per resource kind, each assembled as an ordered action
//! pipeline over the shared engine.
//!
//! ## Module Structure
//!
//! - `context.rs` - Shared stores, FIPS mode, and backoff state
//! - `trust_stack/` - Composite resource reconciler
//! - `timestamp_authority/` - Timestamping authority reconciler

pub mod context;
pub mod timestamp_authority;
pub mod trust_stack;

pub use context::Context;
