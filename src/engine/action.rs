//! # Action
//!
//! One named, guarded, idempotent unit of reconciliation logic.
//!
//! Actions are assembled into a [`Pipeline`](crate::engine::pipeline::Pipeline)
//! per resource kind. `can_handle` is a pure predicate over the instance;
//! `handle` performs the work and reports an [`Outcome`]. An action may read
//! anything but writes only its own instance's status (at most once) and its
//! owned children through ensure.

use crate::engine::outcome::{ActionError, Outcome};
use async_trait::async_trait;

#[async_trait]
pub trait Action<R>: Send + Sync {
    /// Stable name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Whether this action applies to the instance in its current state.
    /// Must be side-effect free.
    fn can_handle(&self, instance: &R) -> bool;

    /// Perform the action against the instance
    async fn handle(&self, instance: &mut R) -> Outcome;

    /// Whether this action wants to intercept its own failure
    fn can_handle_error(&self, _instance: &R, _error: &ActionError) -> bool {
        false
    }

    /// Action-specific error recovery; the default just passes the error
    /// back to the pipeline
    async fn handle_error(&self, _instance: &mut R, error: ActionError) -> Outcome {
        Outcome::Error(error)
    }
}
