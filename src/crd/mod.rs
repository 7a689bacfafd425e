//! # Custom Resource Definitions
//!
//! - `issuer.rs` - `Issuer` and `ClusterIssuer`, owned by this controller
//! - `certificate_request.rs` - cert-manager's `CertificateRequest`
//! - `condition.rs` - status conditions shared by all of them

mod certificate_request;
mod condition;
mod issuer;

pub use certificate_request::{
    CertificateRequest, CertificateRequestSpec, CertificateRequestStatus, IssuerReference,
};
pub use condition::{
    Condition, ConditionStatus, CONDITION_APPROVED, CONDITION_DENIED, CONDITION_READY,
    REASON_DENIED, REASON_ERROR, REASON_FAILED, REASON_ISSUED, REASON_PENDING, REASON_VERIFIED,
};
pub use issuer::{ClusterIssuer, ClusterIssuerSpec, Issuer, IssuerSpec, IssuerStatus};
