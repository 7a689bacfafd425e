//! Status condition shared by `CertificateRequest`, `Issuer` and `ClusterIssuer`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition type summarising whether a resource reached its terminal success state
pub const CONDITION_READY: &str = "Ready";
/// Set by an approval controller once a request may be signed
pub const CONDITION_APPROVED: &str = "Approved";
/// Set by an approval controller when a request must never be signed
pub const CONDITION_DENIED: &str = "Denied";

/// Ready reasons written on CertificateRequests
pub const REASON_PENDING: &str = "Pending";
pub const REASON_FAILED: &str = "Failed";
pub const REASON_ISSUED: &str = "Issued";
pub const REASON_DENIED: &str = "Denied";

/// Ready reasons written on issuers
pub const REASON_VERIFIED: &str = "Verified";
pub const REASON_ERROR: &str = "Error";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: ConditionStatus,
    /// RFC 3339 timestamp of the last `status` change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}
