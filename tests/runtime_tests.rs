//! Controller glue: deadlines, result mapping and error requeues

mod common;

use azure_keyvault_issuer::config::ControllerConfig;
use azure_keyvault_issuer::controller::clock::SystemClock;
use azure_keyvault_issuer::controller::issuer_ref::IssuerRegistry;
use azure_keyvault_issuer::controller::reconciler::{
    CertificateRequestReconciler, IssuerReconciler, ReconcilerOptions,
};
use azure_keyvault_issuer::crd::ConditionStatus;
use azure_keyvault_issuer::runtime::error_policy::certificate_request_error_policy;
use azure_keyvault_issuer::runtime::watch_loop::{
    reconcile_certificate_request, reconcile_issuer, ControllerContext,
};
use common::*;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn context(
    store: Arc<MemoryStore>,
    signers: Arc<ScriptedSigners>,
    config: &ControllerConfig,
) -> Arc<ControllerContext> {
    let clock = Arc::new(SystemClock);
    let certificate_requests = CertificateRequestReconciler::new(
        store.clone(),
        IssuerRegistry::azure_keyvault(),
        signers.clone(),
        clock.clone(),
        ReconcilerOptions {
            cluster_resource_namespace: CLUSTER_RESOURCE_NAMESPACE.to_string(),
            check_approved_condition: true,
        },
    );
    let issuers = IssuerReconciler::new(store, signers, clock, CLUSTER_RESOURCE_NAMESPACE);
    Arc::new(ControllerContext::new(
        certificate_requests,
        issuers,
        config,
        CancellationToken::new(),
    ))
}

fn default_context(store: Arc<MemoryStore>, behavior: SignBehavior) -> Arc<ControllerContext> {
    context(store, ScriptedSigners::new(behavior), &ControllerConfig::default())
}

#[tokio::test]
async fn test_deadline_fires_after_timeout() {
    let config = ControllerConfig {
        reconcile_timeout_secs: 0,
        ..ControllerConfig::default()
    };
    let ctx = context(
        MemoryStore::new(),
        ScriptedSigners::new(SignBehavior::Pending),
        &config,
    );

    let deadline = ctx.deadline();
    tokio::time::timeout(Duration::from_secs(5), deadline.token().cancelled())
        .await
        .expect("deadline cancelled");
    assert!(!ctx.shutdown.is_cancelled());
}

#[tokio::test]
async fn test_shutdown_cancels_running_deadlines() {
    let ctx = default_context(MemoryStore::new(), SignBehavior::Pending);

    let deadline = ctx.deadline();
    assert!(!deadline.token().is_cancelled());
    ctx.shutdown.cancel();
    assert!(deadline.token().is_cancelled());
}

#[tokio::test]
async fn test_successful_reconcile_awaits_change() {
    let store = MemoryStore::new();
    store.put_issuer(issuer(Some(ConditionStatus::True)));
    store.put_secret(auth_secret(NAMESPACE));
    let cr = initialized_request("Issuer");
    store.put_request(cr.clone());
    let ctx = default_context(store.clone(), SignBehavior::Certificate(vec![0x30]));

    let action = reconcile_certificate_request(Arc::new(cr), ctx)
        .await
        .expect("issued");

    assert_eq!(action, Action::await_change());
    assert!(store.request(&request_key()).ready_condition().unwrap().is_true());
}

#[tokio::test]
async fn test_failed_reconcile_requeues_with_backoff() {
    let store = MemoryStore::new();
    store.put_issuer(issuer(Some(ConditionStatus::False)));
    let cr = Arc::new(initialized_request("Issuer"));
    store.put_request((*cr).clone());
    let ctx = default_context(store, SignBehavior::Pending);

    let err = reconcile_certificate_request(Arc::clone(&cr), Arc::clone(&ctx))
        .await
        .unwrap_err();

    assert_eq!(
        certificate_request_error_policy(Arc::clone(&cr), &err, Arc::clone(&ctx)),
        Action::requeue(Duration::from_secs(5))
    );
    assert_eq!(
        certificate_request_error_policy(Arc::clone(&cr), &err, Arc::clone(&ctx)),
        Action::requeue(Duration::from_secs(5))
    );
    assert_eq!(
        certificate_request_error_policy(cr, &err, ctx),
        Action::requeue(Duration::from_secs(10))
    );
}

#[tokio::test]
async fn test_issuer_reconcile_awaits_change() {
    let store = MemoryStore::new();
    let stored = issuer(None);
    store.put_issuer(stored.clone());
    store.put_secret(auth_secret(NAMESPACE));
    let ctx = default_context(store, SignBehavior::Certificate(Vec::new()));

    let action = reconcile_issuer(Arc::new(stored), ctx).await.expect("verified");
    assert_eq!(action, Action::await_change());
}
