//! # Azure Key Vault Issuer
//!
//! Entry point of the controller binary. Flags override the environment.

use anyhow::Result;
use azure_keyvault_issuer::config::ControllerConfig;
use azure_keyvault_issuer::runtime::{initialize, run_watch_loop, watch_loop::shutdown_signal};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

/// cert-manager external issuer backed by Azure Key Vault
#[derive(Parser, Debug)]
#[command(name = "azure-keyvault-issuer", version, about, long_about = None)]
struct Args {
    /// Namespace holding the auth secrets of ClusterIssuers (defaults to the pod namespace)
    #[arg(long)]
    cluster_resource_namespace: Option<String>,

    /// Port of the metrics and probe server
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Sign CertificateRequests without waiting for an Approved condition
    #[arg(long)]
    disable_approved_check: bool,
}

impl Args {
    fn apply(self, config: &mut ControllerConfig) {
        if let Some(namespace) = self.cluster_resource_namespace {
            config.cluster_resource_namespace = namespace;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if self.disable_approved_check {
            config.check_approved_condition = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = ControllerConfig::from_env();
    Args::parse().apply(&mut config);

    let init = initialize(config).await?;

    let shutdown = init.context.shutdown.clone();
    let server_state = Arc::clone(&init.server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, waiting for in-flight reconciliations to complete...");
        server_state.set_ready(false);
        shutdown.cancel();
    });

    run_watch_loop(init.client.clone(), Arc::clone(&init.context), &init.config).await?;

    init.server_shutdown.cancel();
    if let Err(e) = init.server_handle.await {
        tracing::warn!("HTTP server task ended abnormally: {}", e);
    }
    Ok(())
}
