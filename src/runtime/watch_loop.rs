//! # Watch Loop
//!
//! Controller watch loops for the composite resource and the timestamp
//! authority. The composite controller re-reconciles whenever one of its
//! owned child resources changes; the timestamp authority controller also
//! watches its own bundle secrets so a deleted bundle is regenerated.

use crate::config::ControllerConfig;
use crate::constants;
use crate::controller::{timestamp_authority, trust_stack, Context};
use crate::crd::{
    CertificateAuthority, MetadataService, TimestampAuthority, TransparencyLog, TreeLog, TrustStack,
};
use crate::runtime::error_policy;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run both controllers until shutdown
pub async fn run(client: Client, ctx: Arc<Context>, config: &ControllerConfig) -> anyhow::Result<()> {
    info!("Starting controller watch loops...");
    let restart_delay = config.watch_restart_delay_secs;

    let stack_ctx = Arc::clone(&ctx);
    let stacks = Controller::new(
        Api::<TrustStack>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .owns(
        Api::<TimestampAuthority>::all(client.clone()),
        watcher::Config::default(),
    )
    .owns(
        Api::<TransparencyLog>::all(client.clone()),
        watcher::Config::default(),
    )
    .owns(
        Api::<TreeLog>::all(client.clone()),
        watcher::Config::default(),
    )
    .owns(
        Api::<CertificateAuthority>::all(client.clone()),
        watcher::Config::default(),
    )
    .owns(
        Api::<MetadataService>::all(client.clone()),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(
        trust_stack::reconcile,
        error_policy::handle_reconciliation_error,
        Arc::clone(&ctx),
    )
    .for_each(move |result| {
        let ctx = Arc::clone(&stack_ctx);
        async move {
            match result {
                Ok((object, _)) => {
                    error_policy::reset_backoff(
                        &ctx,
                        object.namespace.as_deref().unwrap_or("default"),
                        &object.name,
                    );
                    debug!("TrustStack reconciliation event for {}", object.name);
                }
                Err(err) => {
                    warn!("TrustStack watch stream error");
                    error_policy::handle_watch_stream_error(&format!("{err:?}"), restart_delay)
                        .await;
                }
            }
        }
    });

    let tsa_ctx = Arc::clone(&ctx);
    let tsas = Controller::new(
        Api::<TimestampAuthority>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .owns(
        Api::<Secret>::all(client.clone()),
        watcher::Config::default().labels(constants::SIGNER_CONFIG_LABEL),
    )
    .shutdown_on_signal()
    .run(
        timestamp_authority::reconcile,
        error_policy::handle_reconciliation_error,
        Arc::clone(&ctx),
    )
    .for_each(move |result| {
        let ctx = Arc::clone(&tsa_ctx);
        async move {
            match result {
                Ok((object, _)) => {
                    error_policy::reset_backoff(
                        &ctx,
                        object.namespace.as_deref().unwrap_or("default"),
                        &object.name,
                    );
                    debug!("TimestampAuthority reconciliation event for {}", object.name);
                }
                Err(err) => {
                    warn!("TimestampAuthority watch stream error");
                    error_policy::handle_watch_stream_error(&format!("{err:?}"), restart_delay)
                        .await;
                }
            }
        }
    });

    tokio::join!(stacks, tsas);
    info!("Controller watch loops stopped");
    Ok(())
}
