//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loops.
//!
//! Backoff state is tracked per resource (`namespace/name`) so one failing
//! resource never slows down the others, and lives in this layer rather
//! than inside the reconcilers so the watch and timer paths stay unblocked.

use crate::constants;
use crate::controller::Context;
use crate::engine::pipeline::ReconcileError;
use crate::runtime::backoff::FibonacciBackoff;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action as RequeueDirective;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Backoff state for a single resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(
                constants::DEFAULT_ERROR_BACKOFF_MIN_MINUTES,
                constants::DEFAULT_ERROR_BACKOFF_MAX_MINUTES,
            ),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle a reconciliation error with per-resource Fibonacci backoff
pub fn handle_reconciliation_error<K>(
    object: Arc<K>,
    error: &ReconcileError,
    ctx: Arc<Context>,
) -> RequeueDirective
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let name = object.name_any();
    let namespace = object.namespace().unwrap_or_else(|| "default".to_string());
    error!("❌ Reconciliation error for {kind} {namespace}/{name}: {error}");

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key).or_default();
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff states: {e}, using default backoff");
            (60, 0)
        }
    };

    info!(
        "🔁 Retrying {kind} {namespace}/{name} in {backoff_seconds}s (error count: {error_count})"
    );
    RequeueDirective::requeue(Duration::from_secs(backoff_seconds))
}

/// Reset a resource's backoff after a successful reconciliation
pub fn reset_backoff(ctx: &Context, namespace: &str, name: &str) {
    if let Ok(mut states) = ctx.backoff_states.lock() {
        if let Some(state) = states.get_mut(&format!("{namespace}/{name}")) {
            if state.error_count > 0 {
                info!("🔄 Backoff reset for {namespace}/{name}, returning to watch-driven schedule");
            }
            state.reset();
        }
    }
}

/// Classify a watch stream error and wait out the appropriate delay before
/// the stream restarts. 410 (expired resource version) and 404 are routine;
/// everything else gets a short restart delay.
pub async fn handle_watch_stream_error(error_string: &str, restart_delay_secs: u64) {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_unauthorized =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_expired = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");

    if is_unauthorized {
        error!(
            "❌ Watch authentication failed (401) - RBAC may have been revoked or the token expired"
        );
        tokio::time::sleep(Duration::from_secs(restart_delay_secs)).await;
    } else if is_expired {
        warn!("Watch resource version expired (410), stream will restart - normal during restarts");
    } else if is_not_found {
        warn!("Watched resource not found (404) - normal when a CRD or resource was just deleted");
    } else {
        error!("Controller stream error: {error_string}");
        tokio::time::sleep(Duration::from_secs(restart_delay_secs)).await;
    }
}
