//! # Initialization
//!
//! Controller startup: rustls provider, logging, metrics, probe server,
//! Kubernetes client and the reconcilers.

use crate::config::ControllerConfig;
use crate::controller::clock::{Clock, SystemClock};
use crate::controller::issuer_ref::IssuerRegistry;
use crate::controller::reconciler::{
    CertificateRequestReconciler, IssuerReconciler, ReconcilerOptions,
};
use crate::controller::store::{KubeStore, ResourceStore};
use crate::observability;
use crate::runtime::watch_loop::ControllerContext;
use crate::server::{start_server, ServerState};
use crate::signer::{KeyVaultSignerBuilder, SignerBuilder};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Everything `main` needs to run the controllers and shut down cleanly
pub struct InitializationResult {
    pub client: Client,
    pub context: Arc<ControllerContext>,
    pub server_state: Arc<ServerState>,
    /// Stops the probe server; cancelled after the controllers have drained
    pub server_shutdown: CancellationToken,
    pub server_handle: JoinHandle<()>,
    /// Configuration with the cluster resource namespace resolved
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub async fn initialize(mut config: ControllerConfig) -> Result<InitializationResult> {
    // Must run before any TLS client is built.
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    observability::logging::init_logging(&config.log_level, config.json_logs())?;
    if !provider_installed {
        debug!("rustls crypto provider was already installed");
    }

    info!("Starting Azure Key Vault issuer");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_shutdown = CancellationToken::new();
    let server_handle = {
        let state = Arc::clone(&server_state);
        let shutdown = server_shutdown.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let cluster_resource_namespace = config
        .resolve_cluster_resource_namespace()
        .context("Failed to determine the cluster resource namespace")?
        .to_string();
    info!(
        cluster_resource_namespace = %cluster_resource_namespace,
        check_approved_condition = config.check_approved_condition,
        "Controller configuration resolved"
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(client.clone()));
    let signers: Arc<dyn SignerBuilder> = Arc::new(KeyVaultSignerBuilder);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let certificate_requests = CertificateRequestReconciler::new(
        Arc::clone(&store),
        IssuerRegistry::azure_keyvault(),
        Arc::clone(&signers),
        Arc::clone(&clock),
        ReconcilerOptions {
            cluster_resource_namespace: cluster_resource_namespace.clone(),
            check_approved_condition: config.check_approved_condition,
        },
    );
    let issuers = IssuerReconciler::new(store, signers, clock, cluster_resource_namespace);
    let context = Arc::new(ControllerContext::new(
        certificate_requests,
        issuers,
        &config,
        CancellationToken::new(),
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        context,
        server_state,
        server_shutdown,
        server_handle,
        config,
    })
}

/// Poll until `start_server` has bound its port
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
