//! # CertificateRequest Reconciliation
//!
//! One invocation walks a request through these gates:
//!
//! 1. gone, foreign `issuerRef.group` or already `Ready=True` -> ignored, nothing written
//! 2. denied -> `Ready=False/Denied`, `failureTime` set once
//! 3. not yet approved (when approval checks are on) -> wait
//! 4. no Ready condition yet -> `Ready=False/Pending` "Initializing"
//! 5. resolve issuer, auth secret and signer, then sign -> `Ready=True/Issued`
//!
//! Past step 1 the status is written exactly once, whatever the outcome. Terminal
//! problems (unknown issuer kind, malformed issuer) end as `Ready=False/Failed` and
//! an `Ok`; everything else is recorded as `Ready=False/Pending` with the error
//! message and returned so the runtime retries with backoff.

use super::types::{
    guarded, merge_persist_result, IgnoreReason, ReconcileError, ReconcileOutcome,
};
use crate::controller::clock::{format_timestamp, Clock};
use crate::controller::conditions::set_condition;
use crate::controller::issuer_ref::IssuerRegistry;
use crate::controller::store::{ObjectKey, ResourceStore};
use crate::crd::{
    CertificateRequest, ConditionStatus, CONDITION_READY, REASON_DENIED, REASON_FAILED,
    REASON_ISSUED, REASON_PENDING,
};
use crate::signer::SignerBuilder;
use k8s_openapi::ByteString;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

const DENIED_MESSAGE: &str = "The CertificateRequest was denied by an approval controller";
const INITIALIZING_MESSAGE: &str = "Initializing";
const SIGNED_MESSAGE: &str = "Signed";

#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Namespace holding the auth secrets of cluster-scoped issuers
    pub cluster_resource_namespace: String,
    /// Wait for `Approved=True` before signing
    pub check_approved_condition: bool,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            cluster_resource_namespace: String::new(),
            check_approved_condition: true,
        }
    }
}

pub struct CertificateRequestReconciler {
    store: Arc<dyn ResourceStore>,
    registry: IssuerRegistry,
    signers: Arc<dyn SignerBuilder>,
    clock: Arc<dyn Clock>,
    options: ReconcilerOptions,
}

impl std::fmt::Debug for CertificateRequestReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRequestReconciler")
            .field("registry", &self.registry)
            .field("clock", &self.clock)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CertificateRequestReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        registry: IssuerRegistry,
        signers: Arc<dyn SignerBuilder>,
        clock: Arc<dyn Clock>,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            store,
            registry,
            signers,
            clock,
            options,
        }
    }

    /// Reconcile the CertificateRequest stored under `key`
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let span = info_span!(
            "controller.reconcile",
            resource.kind = "CertificateRequest",
            resource.namespace = key.namespace_or_default(),
            resource.name = %key.name
        );
        self.reconcile_inner(key, cancel).instrument(span).await
    }

    async fn reconcile_inner(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let fetched = guarded(cancel, self.store.get_certificate_request(key))
            .await?
            .map_err(|source| ReconcileError::RequestFetch {
                key: key.clone(),
                source,
            })?;

        let Some(mut request) = fetched else {
            debug!("CertificateRequest not found, ignoring");
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::NotFound));
        };

        let group = &request.spec.issuer_ref.group;
        if !self.registry.owns_group(group) {
            debug!(issuer.group = %group, "Foreign issuer group, ignoring");
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::ForeignGroup));
        }

        if request.ready_condition().is_some_and(|c| c.is_true()) {
            debug!("CertificateRequest is already Ready, ignoring");
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::AlreadyReady));
        }

        let decision = self.decide(&mut request, cancel).await;

        // Written even after cancellation so the Pending condition records it.
        let persisted = self
            .store
            .update_certificate_request_status(&request)
            .await;

        let result = merge_persist_result(decision, persisted);
        match &result {
            Ok(outcome) => info!(outcome = outcome.as_str(), "Reconciled CertificateRequest"),
            Err(e) => warn!(error = %e, "CertificateRequest reconciliation will be retried"),
        }
        result
    }

    /// Apply gates and signing to the in-memory request
    async fn decide(
        &self,
        request: &mut CertificateRequest,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let now = self.clock.now();

        if request.is_denied() {
            let status = request.status_mut();
            if status.failure_time.is_none() {
                status.failure_time = Some(format_timestamp(now));
            }
            set_condition(
                status,
                CONDITION_READY,
                ConditionStatus::False,
                REASON_DENIED,
                DENIED_MESSAGE,
                now,
            );
            return Ok(ReconcileOutcome::Denied);
        }

        if self.options.check_approved_condition && !request.is_approved() {
            debug!("CertificateRequest has not been approved yet");
            return Ok(ReconcileOutcome::AwaitingApproval);
        }

        if request.ready_condition().is_none() {
            set_condition(
                request.status_mut(),
                CONDITION_READY,
                ConditionStatus::False,
                REASON_PENDING,
                INITIALIZING_MESSAGE,
                now,
            );
            return Ok(ReconcileOutcome::Initialized);
        }

        let issued = self.issue(request, cancel).await;
        let now = self.clock.now();
        let status = request.status_mut();
        match issued {
            Ok(certificate) => {
                status.certificate = Some(ByteString(certificate));
                set_condition(
                    status,
                    CONDITION_READY,
                    ConditionStatus::True,
                    REASON_ISSUED,
                    SIGNED_MESSAGE,
                    now,
                );
                Ok(ReconcileOutcome::Issued)
            }
            Err(e) if e.is_terminal() => {
                set_condition(
                    status,
                    CONDITION_READY,
                    ConditionStatus::False,
                    REASON_FAILED,
                    &e.to_string(),
                    now,
                );
                Ok(ReconcileOutcome::Failed)
            }
            Err(e) => {
                set_condition(
                    status,
                    CONDITION_READY,
                    ConditionStatus::False,
                    REASON_PENDING,
                    &e.to_string(),
                    now,
                );
                Err(e)
            }
        }
    }

    /// Resolve the issuer chain and sign; returns the certificate bytes
    async fn issue(
        &self,
        request: &CertificateRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ReconcileError> {
        let issuer_ref = &request.spec.issuer_ref;
        let kind = self.registry.resolve(&issuer_ref.kind).ok_or_else(|| {
            ReconcileError::UnrecognizedIssuerKind {
                group: issuer_ref.group.clone(),
                kind: issuer_ref.kind.clone(),
            }
        })?;

        let namespace = request.metadata.namespace.as_deref().unwrap_or_default();
        let request_name = request.metadata.name.as_deref().unwrap_or_default();
        let issuer_key = kind.lookup_key(namespace, &issuer_ref.name);

        let issuer = guarded(cancel, self.store.get_issuer(kind, &issuer_key))
            .await?
            .map_err(|source| ReconcileError::IssuerFetch {
                kind,
                key: issuer_key.clone(),
                source,
            })?;

        let issuer_spec = issuer
            .spec_and_status(kind)
            .map_err(|reason| ReconcileError::MalformedIssuer {
                name: issuer_key.to_string(),
                reason,
            })?;

        if !issuer_spec.is_ready() {
            return Err(ReconcileError::IssuerNotReady {
                name: issuer_key.to_string(),
            });
        }

        let secret_key = ObjectKey::namespaced(
            kind.secret_namespace(namespace, &self.options.cluster_resource_namespace),
            &issuer_spec.auth_secret_name,
        );
        let secret = guarded(cancel, self.store.get_secret(&secret_key))
            .await?
            .map_err(|source| ReconcileError::SecretFetch {
                key: secret_key.clone(),
                source,
            })?;
        let secret_data = secret.data.unwrap_or_default();

        let signer = self
            .signers
            .build(&secret_data, &issuer_spec.keyvault_name)
            .map_err(|source| ReconcileError::SignerBuild {
                issuer: issuer_spec.issuer_name.clone(),
                source,
            })?;

        debug!(
            issuer = %issuer_key,
            keyvault = %issuer_spec.keyvault_name,
            keyvault.issuer = %issuer_spec.issuer_name,
            "Signing CertificateRequest"
        );
        guarded(
            cancel,
            signer.sign(&request.spec.request.0, request_name, &issuer_spec.issuer_name),
        )
        .await?
        .map_err(|source| ReconcileError::Sign {
            name: request_name.to_string(),
            source,
        })
    }
}
