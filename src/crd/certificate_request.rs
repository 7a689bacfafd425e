//! # CertificateRequest
//!
//! Mirror of cert-manager's `cert-manager.io/v1` `CertificateRequest`, limited to
//! the fields an external issuer reads or writes. The CRD itself is owned and
//! installed by cert-manager, so no schema is generated for it here.

use super::condition::{Condition, CONDITION_APPROVED, CONDITION_DENIED, CONDITION_READY};
use k8s_openapi::ByteString;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "CertificateRequest",
    namespaced,
    status = "CertificateRequestStatus",
    schema = "disabled",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestSpec {
    /// Issuer that should sign this request
    pub issuer_ref: IssuerReference,
    /// PEM-encoded PKCS#10 certificate signing request
    pub request: ByteString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, rename = "isCA")]
    pub is_ca: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usages: Vec<String>,
}

/// Reference from a request to the issuer resource that should sign it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Signed certificate as returned by the CA backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<ByteString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<ByteString>,
    /// RFC 3339 timestamp of the first terminal failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_time: Option<String>,
}

impl CertificateRequest {
    fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.r#type == condition_type)
    }

    /// Whether an approval controller denied this request
    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.condition(CONDITION_DENIED).is_some_and(Condition::is_true)
    }

    /// Whether an approval controller approved this request
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.condition(CONDITION_APPROVED)
            .is_some_and(Condition::is_true)
    }

    pub fn ready_condition(&self) -> Option<&Condition> {
        self.condition(CONDITION_READY)
    }

    /// Mutable status, created on first access
    pub fn status_mut(&mut self) -> &mut CertificateRequestStatus {
        self.status.get_or_insert_with(CertificateRequestStatus::default)
    }
}
