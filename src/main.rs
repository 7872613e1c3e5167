//! # Trust Stack Operator
//!
//! Operator entry point: installs the crypto provider, reads the FIPS flag
//! once, wires the shared context, and runs the controller watch loops next
//! to the metrics/probe server.

use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trust_stack_operator::config::ControllerConfig;
use trust_stack_operator::controller::Context;
use trust_stack_operator::observability::metrics;
use trust_stack_operator::pki::FipsMode;
use trust_stack_operator::runtime::watch_loop;
use trust_stack_operator::server::{start_server, ServerState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let config = ControllerConfig::from_env();
    let fips = FipsMode::from_host();
    info!(
        "🚀 Starting trust-stack-operator (build {} at {}, FIPS mode: {})",
        env!("BUILD_GIT_HASH"),
        env!("BUILD_DATETIME"),
        fips.is_enabled()
    );

    metrics::register();
    let server_state = Arc::new(ServerState::new());
    tokio::spawn(start_server(config.metrics_port, Arc::clone(&server_state)));

    let client = Client::try_default().await?;
    let ctx = Context::new(&client, fips);
    watch_loop::run(client, ctx, &config).await
}
