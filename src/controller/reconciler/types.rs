//! # Types
//!
//! Outcomes, errors and shared helpers of the reconcilers.

use crate::controller::issuer_ref::IssuerKind;
use crate::controller::store::{ObjectKey, StoreError};
use crate::signer::SignerError;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a reconciliation left the object untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The object no longer exists
    NotFound,
    /// `issuerRef.group` belongs to another issuer implementation
    ForeignGroup,
    /// The request already carries `Ready=True`
    AlreadyReady,
}

/// Result of a reconciliation that needs no retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Ignored(IgnoreReason),
    Denied,
    AwaitingApproval,
    Initialized,
    /// Terminal failure recorded as `Ready=False/Failed`
    Failed,
    Issued,
    /// Issuer credentials and CA issuer checked successfully
    Verified,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored(IgnoreReason::NotFound) => "ignored-not-found",
            Self::Ignored(IgnoreReason::ForeignGroup) => "ignored-foreign-group",
            Self::Ignored(IgnoreReason::AlreadyReady) => "ignored-already-ready",
            Self::Denied => "denied",
            Self::AwaitingApproval => "awaiting-approval",
            Self::Initialized => "initialized",
            Self::Failed => "failed",
            Self::Issued => "issued",
            Self::Verified => "verified",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to get CertificateRequest {key}: {source}")]
    RequestFetch {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("issuerRef kind {kind:?} is not a known issuer kind of group {group}")]
    UnrecognizedIssuerKind { group: String, kind: String },

    #[error("issuer {name} is malformed: {reason}")]
    MalformedIssuer { name: String, reason: String },

    #[error("failed to get {kind} {key}: {source}")]
    IssuerFetch {
        kind: IssuerKind,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("issuer {name} is not ready")]
    IssuerNotReady { name: String },

    #[error("failed to get auth secret {key}: {source}")]
    SecretFetch {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("failed to build signer for issuer {issuer}: {source}")]
    SignerBuild {
        issuer: String,
        #[source]
        source: SignerError,
    },

    #[error("failed to sign CertificateRequest {name}: {source}")]
    Sign {
        name: String,
        #[source]
        source: SignerError,
    },

    #[error("failed to verify keyvault issuer {issuer}: {source}")]
    IssuerCheck {
        issuer: String,
        #[source]
        source: SignerError,
    },

    #[error("reconciliation cancelled")]
    Cancelled,

    #[error(
        "failed to persist status: {source}{}",
        .operation.as_ref().map(|e| format!(" (after: {e})")).unwrap_or_default()
    )]
    StatusPersist {
        /// The error the reconciliation had already run into, if any
        operation: Option<Box<ReconcileError>>,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    /// Terminal errors are recorded on the object and never retried
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedIssuerKind { .. } | Self::MalformedIssuer { .. }
        )
    }

    /// Label used for the error metric
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestFetch { .. } => "request_fetch",
            Self::UnrecognizedIssuerKind { .. } => "unrecognized_issuer_kind",
            Self::MalformedIssuer { .. } => "malformed_issuer",
            Self::IssuerFetch { .. } => "issuer_fetch",
            Self::IssuerNotReady { .. } => "issuer_not_ready",
            Self::SecretFetch { .. } => "secret_fetch",
            Self::SignerBuild { .. } => "signer_build",
            Self::Sign { .. } => "sign",
            Self::IssuerCheck { .. } => "issuer_check",
            Self::Cancelled => "cancelled",
            Self::StatusPersist { .. } => "status_persist",
        }
    }
}

/// Run `future` unless `cancel` fires first; an already cancelled token always wins
pub(crate) async fn guarded<F>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, ReconcileError>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ReconcileError::Cancelled),
        output = future => Ok(output),
    }
}

/// Fold the persistence result into the decision made before it
pub(crate) fn merge_persist_result(
    decision: Result<ReconcileOutcome, ReconcileError>,
    persisted: Result<(), StoreError>,
) -> Result<ReconcileOutcome, ReconcileError> {
    match (decision, persisted) {
        (decision, Ok(())) => decision,
        (Ok(_), Err(source)) => Err(ReconcileError::StatusPersist {
            operation: None,
            source,
        }),
        (Err(operation), Err(source)) => Err(ReconcileError::StatusPersist {
            operation: Some(Box::new(operation)),
            source,
        }),
    }
}
