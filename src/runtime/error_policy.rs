//! # Error Policy
//!
//! Requeue decisions after a reconciliation returned a retryable error.
//! Backoff is tracked per object so one failing request never delays another.

use crate::controller::backoff::BackoffStates;
use crate::controller::reconciler::ReconcileError;
use crate::controller::store::ObjectKey;
use crate::crd::{CertificateRequest, ClusterIssuer, Issuer};
use crate::observability::metrics;
use crate::runtime::watch_loop::{
    cluster_issuer_key, namespaced_key, ControllerContext, CERTIFICATE_REQUEST_CONTROLLER,
    CLUSTER_ISSUER_CONTROLLER, ISSUER_CONTROLLER,
};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info};

pub fn certificate_request_error_policy(
    request: Arc<CertificateRequest>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext>,
) -> Action {
    requeue_after_error(
        CERTIFICATE_REQUEST_CONTROLLER,
        &namespaced_key(request.as_ref()),
        error,
        &ctx.request_backoff,
    )
}

pub fn issuer_error_policy(
    issuer: Arc<Issuer>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext>,
) -> Action {
    requeue_after_error(
        ISSUER_CONTROLLER,
        &namespaced_key(issuer.as_ref()),
        error,
        &ctx.issuer_backoff,
    )
}

pub fn cluster_issuer_error_policy(
    issuer: Arc<ClusterIssuer>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext>,
) -> Action {
    requeue_after_error(
        CLUSTER_ISSUER_CONTROLLER,
        &cluster_issuer_key(issuer.as_ref()),
        error,
        &ctx.cluster_issuer_backoff,
    )
}

/// Count the error and requeue `key` after its next Fibonacci delay
pub fn requeue_after_error(
    controller: &str,
    key: &ObjectKey,
    error: &ReconcileError,
    backoff: &BackoffStates,
) -> Action {
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        controller,
        resource.namespace = key.namespace_or_default(),
        resource.name = %key.name,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", key, error);
    metrics::increment_reconciliation_errors(controller, error.kind());

    let (delay, error_count) = backoff.next_delay(key);
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        delay_secs = delay.as_secs(),
        error_count,
        next_retry = %crate::controller::clock::format_timestamp(next_trigger_time),
        "Retrying with Fibonacci backoff"
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_requeue_follows_per_object_backoff() {
        let backoff = BackoffStates::new(5, 300);
        let web = ObjectKey::namespaced("apps", "web-1");
        let api = ObjectKey::namespaced("apps", "api-1");
        let error = ReconcileError::IssuerNotReady {
            name: "kv-issuer".to_string(),
        };

        let delays: Vec<Action> = (0..3)
            .map(|_| requeue_after_error("certificaterequest", &web, &error, &backoff))
            .collect();
        assert_eq!(
            delays,
            vec![
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(10)),
            ]
        );

        assert_eq!(
            requeue_after_error("certificaterequest", &api, &error, &backoff),
            Action::requeue(Duration::from_secs(5))
        );
    }
}
