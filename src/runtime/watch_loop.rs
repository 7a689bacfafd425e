//! # Watch Loop
//!
//! Runs one kube-runtime `Controller` per watched kind. Every reconciliation
//! gets a child of the shutdown token that is also cancelled once the
//! configured reconcile timeout elapses, so in-flight Key Vault calls stop and
//! the reconciler still records the interruption on the object.

use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffStates;
use crate::controller::issuer_ref::IssuerKind;
use crate::controller::reconciler::{
    CertificateRequestReconciler, IssuerReconciler, ReconcileError, ReconcileOutcome,
};
use crate::controller::store::ObjectKey;
use crate::crd::{CertificateRequest, ClusterIssuer, Issuer};
use crate::observability::metrics;
use crate::runtime::error_policy::{
    certificate_request_error_policy, cluster_issuer_error_policy, issuer_error_policy,
};
use futures::StreamExt;
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::controller::{self, Action};
use kube_runtime::{watcher, Controller};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

pub const CERTIFICATE_REQUEST_CONTROLLER: &str = "certificaterequest";
pub const ISSUER_CONTROLLER: &str = "issuer";
pub const CLUSTER_ISSUER_CONTROLLER: &str = "clusterissuer";

/// Shared state handed to every reconciliation
#[derive(Debug)]
pub struct ControllerContext {
    pub certificate_requests: CertificateRequestReconciler,
    pub issuers: IssuerReconciler,
    pub request_backoff: BackoffStates,
    pub issuer_backoff: BackoffStates,
    pub cluster_issuer_backoff: BackoffStates,
    /// Cancelled once on process shutdown
    pub shutdown: CancellationToken,
    pub reconcile_timeout: Duration,
}

impl ControllerContext {
    pub fn new(
        certificate_requests: CertificateRequestReconciler,
        issuers: IssuerReconciler,
        config: &ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let backoff = || BackoffStates::new(config.backoff_min_secs, config.backoff_max_secs);
        Self {
            certificate_requests,
            issuers,
            request_backoff: backoff(),
            issuer_backoff: backoff(),
            cluster_issuer_backoff: backoff(),
            shutdown,
            reconcile_timeout: config.reconcile_timeout(),
        }
    }

    /// Token for one reconciliation: cancelled on shutdown or after the timeout
    pub fn deadline(&self) -> Deadline {
        let token = self.shutdown.child_token();
        let timer_token = token.clone();
        let timeout = self.reconcile_timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timer_token.cancel();
        });
        Deadline { token, timer }
    }
}

/// Cancellation scope of a single reconciliation; dropping it stops the timer
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl Deadline {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

pub(crate) fn namespaced_key<K: Resource>(obj: &K) -> ObjectKey {
    ObjectKey::namespaced(obj.namespace().unwrap_or_default(), obj.name_any())
}

pub(crate) fn cluster_issuer_key(issuer: &ClusterIssuer) -> ObjectKey {
    ObjectKey::cluster(issuer.name_any())
}

pub async fn reconcile_certificate_request(
    request: Arc<CertificateRequest>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let key = namespaced_key(request.as_ref());
    let start = Instant::now();
    let deadline = ctx.deadline();
    let result = ctx
        .certificate_requests
        .reconcile(&key, deadline.token())
        .await;
    drop(deadline);
    finish(
        CERTIFICATE_REQUEST_CONTROLLER,
        &key,
        &ctx.request_backoff,
        start,
        result,
    )
}

pub async fn reconcile_issuer(
    issuer: Arc<Issuer>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let key = namespaced_key(issuer.as_ref());
    let start = Instant::now();
    let deadline = ctx.deadline();
    let result = ctx
        .issuers
        .reconcile(IssuerKind::Issuer, &key, deadline.token())
        .await;
    drop(deadline);
    finish(ISSUER_CONTROLLER, &key, &ctx.issuer_backoff, start, result)
}

pub async fn reconcile_cluster_issuer(
    issuer: Arc<ClusterIssuer>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let key = cluster_issuer_key(issuer.as_ref());
    let start = Instant::now();
    let deadline = ctx.deadline();
    let result = ctx
        .issuers
        .reconcile(IssuerKind::ClusterIssuer, &key, deadline.token())
        .await;
    drop(deadline);
    finish(
        CLUSTER_ISSUER_CONTROLLER,
        &key,
        &ctx.cluster_issuer_backoff,
        start,
        result,
    )
}

fn finish(
    controller: &str,
    key: &ObjectKey,
    backoff: &BackoffStates,
    start: Instant,
    result: Result<ReconcileOutcome, ReconcileError>,
) -> Result<Action, ReconcileError> {
    metrics::observe_reconciliation_duration(controller, start.elapsed().as_secs_f64());
    let outcome = result?;
    backoff.reset(key);
    metrics::increment_reconciliations(controller, outcome.as_str());
    Ok(Action::await_change())
}

/// Run all three controllers until `ctx.shutdown` is cancelled
pub async fn run_watch_loop(
    client: Client,
    ctx: Arc<ControllerContext>,
    config: &ControllerConfig,
) -> Result<(), anyhow::Error> {
    let controller_config =
        controller::Config::default().concurrency(config.max_concurrent_reconciliations);
    let restart_delay = config.watch_restart_delay();

    info!("Starting controller watch loop...");
    tokio::join!(
        run_controller(
            CERTIFICATE_REQUEST_CONTROLLER,
            Api::<CertificateRequest>::all(client.clone()),
            controller_config.clone(),
            restart_delay,
            Arc::clone(&ctx),
            reconcile_certificate_request,
            certificate_request_error_policy,
        ),
        run_controller(
            ISSUER_CONTROLLER,
            Api::<Issuer>::all(client.clone()),
            controller_config.clone(),
            restart_delay,
            Arc::clone(&ctx),
            reconcile_issuer,
            issuer_error_policy,
        ),
        run_controller(
            CLUSTER_ISSUER_CONTROLLER,
            Api::<ClusterIssuer>::all(client),
            controller_config,
            restart_delay,
            Arc::clone(&ctx),
            reconcile_cluster_issuer,
            cluster_issuer_error_policy,
        ),
    );

    info!("Controller stopped gracefully");
    Ok(())
}

/// Drive one `Controller`, restarting it if its stream ends before shutdown
async fn run_controller<K, ReconcileFut>(
    name: &'static str,
    api: Api<K>,
    controller_config: controller::Config,
    restart_delay: Duration,
    ctx: Arc<ControllerContext>,
    reconcile: fn(Arc<K>, Arc<ControllerContext>) -> ReconcileFut,
    error_policy: fn(Arc<K>, &ReconcileError, Arc<ControllerContext>) -> Action,
) where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + serde::de::DeserializeOwned
        + Send
        + Sync
        + 'static,
    ReconcileFut: std::future::Future<Output = Result<Action, ReconcileError>> + Send + 'static,
{
    loop {
        if ctx.shutdown.is_cancelled() {
            break;
        }

        let watch_span = tracing::span!(tracing::Level::INFO, "controller.watch", controller = name);
        info!(parent: &watch_span, "Starting {} controller", name);

        Controller::new(api.clone(), watcher::Config::default().any_semantic())
            .with_config(controller_config.clone())
            .graceful_shutdown_on(ctx.shutdown.clone().cancelled_owned())
            .run(reconcile, error_policy, Arc::clone(&ctx))
            .for_each(|result| async move {
                match result {
                    Ok((obj, _)) => debug!(controller = name, object = %obj, "watch.event.success"),
                    Err(e) => warn!(controller = name, error = %e, "Controller stream error"),
                }
            })
            .instrument(watch_span)
            .await;

        if ctx.shutdown.is_cancelled() {
            break;
        }
        warn!(
            "{} controller stream ended, restarting in {} seconds...",
            name,
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
