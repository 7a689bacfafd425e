//! # Issuer Reconciliation
//!
//! Verifies that an `Issuer` or `ClusterIssuer` can reach its Key Vault
//! certificate issuer with the credentials from its auth secret, and reports
//! the result as the issuer's Ready condition. CertificateRequests wait until
//! that condition is `True`.

use super::types::{
    guarded, merge_persist_result, IgnoreReason, ReconcileError, ReconcileOutcome,
};
use crate::controller::clock::Clock;
use crate::controller::conditions::set_condition;
use crate::controller::issuer_ref::{IssuerKind, IssuerObject};
use crate::controller::store::{ObjectKey, ResourceStore};
use crate::crd::{ConditionStatus, CONDITION_READY, REASON_ERROR, REASON_VERIFIED};
use crate::signer::SignerBuilder;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

pub struct IssuerReconciler {
    store: Arc<dyn ResourceStore>,
    signers: Arc<dyn SignerBuilder>,
    clock: Arc<dyn Clock>,
    cluster_resource_namespace: String,
}

impl std::fmt::Debug for IssuerReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerReconciler")
            .field("cluster_resource_namespace", &self.cluster_resource_namespace)
            .finish_non_exhaustive()
    }
}

impl IssuerReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        signers: Arc<dyn SignerBuilder>,
        clock: Arc<dyn Clock>,
        cluster_resource_namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            signers,
            clock,
            cluster_resource_namespace: cluster_resource_namespace.into(),
        }
    }

    pub async fn reconcile(
        &self,
        kind: IssuerKind,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let span = info_span!(
            "controller.reconcile",
            resource.kind = kind.as_str(),
            resource.namespace = key.namespace_or_default(),
            resource.name = %key.name
        );
        self.reconcile_inner(kind, key, cancel).instrument(span).await
    }

    async fn reconcile_inner(
        &self,
        kind: IssuerKind,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut issuer = match guarded(cancel, self.store.get_issuer(kind, key)).await? {
            Ok(issuer) => issuer,
            Err(e) if e.is_not_found() => {
                debug!("Issuer not found, ignoring");
                return Ok(ReconcileOutcome::Ignored(IgnoreReason::NotFound));
            }
            Err(source) => {
                return Err(ReconcileError::IssuerFetch {
                    kind,
                    key: key.clone(),
                    source,
                })
            }
        };

        let verified = self.verify(kind, key, &issuer, cancel).await;

        let now = self.clock.now();
        let status = issuer.status_mut();
        let decision = match verified {
            Ok(issuer_name) => {
                set_condition(
                    status,
                    CONDITION_READY,
                    ConditionStatus::True,
                    REASON_VERIFIED,
                    &format!("Key Vault issuer {issuer_name} is reachable"),
                    now,
                );
                Ok(ReconcileOutcome::Verified)
            }
            Err(e) => {
                set_condition(
                    status,
                    CONDITION_READY,
                    ConditionStatus::False,
                    REASON_ERROR,
                    &e.to_string(),
                    now,
                );
                if e.is_terminal() {
                    Ok(ReconcileOutcome::Failed)
                } else {
                    Err(e)
                }
            }
        };

        let persisted = self.store.update_issuer_status(&issuer).await;
        let result = merge_persist_result(decision, persisted);
        match &result {
            Ok(outcome) => info!(outcome = outcome.as_str(), "Reconciled issuer"),
            Err(e) => warn!(error = %e, "Issuer reconciliation will be retried"),
        }
        result
    }

    /// Returns the Key Vault issuer name once it has been checked
    async fn verify(
        &self,
        kind: IssuerKind,
        key: &ObjectKey,
        issuer: &IssuerObject,
        cancel: &CancellationToken,
    ) -> Result<String, ReconcileError> {
        let spec = issuer
            .spec_and_status(kind)
            .map_err(|reason| ReconcileError::MalformedIssuer {
                name: key.to_string(),
                reason,
            })?;

        let secret_namespace = kind.secret_namespace(
            key.namespace_or_default(),
            &self.cluster_resource_namespace,
        );
        let secret_key = ObjectKey::namespaced(secret_namespace, &spec.auth_secret_name);
        let secret = guarded(cancel, self.store.get_secret(&secret_key))
            .await?
            .map_err(|source| ReconcileError::SecretFetch {
                key: secret_key.clone(),
                source,
            })?;

        let signer = self
            .signers
            .build(&secret.data.unwrap_or_default(), &spec.keyvault_name)
            .map_err(|source| ReconcileError::SignerBuild {
                issuer: spec.issuer_name.clone(),
                source,
            })?;

        guarded(cancel, signer.check_issuer(&spec.issuer_name))
            .await?
            .map_err(|source| ReconcileError::IssuerCheck {
                issuer: spec.issuer_name.clone(),
                source,
            })?;

        Ok(spec.issuer_name)
    }
}
