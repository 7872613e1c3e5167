//! # Outcome
//!
//! The value an action returns, and the terminal/transient error
//! classification the pipeline acts on.
//!
//! There is exactly one error path on purpose: `Outcome::Error` with an
//! explicit [`ActionError`] classification. Terminal errors pin the `Ready`
//! condition to `Failure`; transient ones are retried on a fixed short delay
//! without touching `Ready`, so routine races never flap the reported state.

use crate::constants;
use crate::engine::ensure::EnsureError;
use crate::engine::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Requeue delay after a detected write conflict
pub const CONFLICT_REQUEUE: Duration = Duration::from_secs(constants::CONFLICT_REQUEUE_SECS);

/// Requeue delay after a transient failure
pub const TRANSIENT_REQUEUE: Duration = Duration::from_secs(constants::TRANSIENT_REQUEUE_SECS);

/// Classified action failure
#[derive(Debug, Error)]
pub enum ActionError {
    /// The desired state cannot be reached without external intervention
    /// (malformed reference, missing owner UID, ...)
    #[error("unrecoverable configuration error: {0}")]
    Terminal(#[source] anyhow::Error),
    /// Expected to resolve on its own (storage conflict, backend briefly
    /// unavailable); retried without recording a failure
    #[error("transient error: {0}")]
    Transient(#[source] anyhow::Error),
}

/// Result of one action's `handle` call
#[derive(Debug)]
pub enum Outcome {
    /// Proceed to the next action in the pipeline
    Continue,
    /// Stop the pipeline; a status write already happened and the watch
    /// event it causes will schedule the next pass
    Stop,
    /// Stop the pipeline and schedule another pass after the delay
    Requeue(Duration),
    /// Stop the pipeline with a classified failure
    Error(ActionError),
}

impl Outcome {
    /// Terminal failure
    pub fn terminal(err: impl Into<anyhow::Error>) -> Self {
        Outcome::Error(ActionError::Terminal(err.into()))
    }

    /// Transient failure
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Outcome::Error(ActionError::Transient(err.into()))
    }

    /// Translate a status-write result.
    ///
    /// Success stops the pipeline with no explicit requeue: the status write
    /// itself triggers the next reconciliation through the watch. A version
    /// conflict becomes a short requeue so the next pass re-reads fresh
    /// state; it is never surfaced as an error.
    #[must_use]
    pub fn from_status_write(result: Result<(), StoreError>) -> Self {
        match result {
            Ok(()) => Outcome::Stop,
            Err(StoreError::Conflict) => Outcome::Requeue(CONFLICT_REQUEUE),
            Err(other) => Outcome::transient(other),
        }
    }

    /// Translate an ensure failure
    #[must_use]
    pub fn from_ensure_error(err: EnsureError) -> Self {
        match err {
            EnsureError::Conflict => Outcome::Requeue(CONFLICT_REQUEUE),
            EnsureError::Policy(message) | EnsureError::InvalidObject(message) => {
                Outcome::terminal(anyhow::anyhow!(message))
            }
            other => Outcome::transient(other),
        }
    }
}
