//! # Reconcilers
//!
//! - `certificate_request.rs` - signs cert-manager CertificateRequests
//! - `issuer.rs` - verifies Issuer / ClusterIssuer credentials
//! - `types.rs` - outcomes and errors shared by both

mod certificate_request;
mod issuer;
mod types;

pub use certificate_request::{CertificateRequestReconciler, ReconcilerOptions};
pub use issuer::IssuerReconciler;
pub use types::{IgnoreReason, ReconcileError, ReconcileOutcome};
