//! # Auth Config
//!
//! Azure credentials read from the issuer's auth secret.
//!
//! | Key                    | Meaning                                     |
//! |------------------------|---------------------------------------------|
//! | `cloud`                | Cloud environment name, empty = public      |
//! | `tenantID`             | AAD tenant                                  |
//! | `aadClientID`          | Service principal client ID                 |
//! | `aadClientSecret`      | Service principal secret                    |
//! | `useManagedIdentity`   | Boolean, selects managed identity           |
//! | `userAssignedIdentity` | Client ID of a user-assigned identity       |

use super::error::SignerError;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_CLOUD: &str = "cloud";
pub const KEY_TENANT_ID: &str = "tenantID";
pub const KEY_CLIENT_ID: &str = "aadClientID";
pub const KEY_CLIENT_SECRET: &str = "aadClientSecret";
pub const KEY_USE_MANAGED_IDENTITY: &str = "useManagedIdentity";
pub const KEY_USER_ASSIGNED_IDENTITY: &str = "userAssignedIdentity";

#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AuthConfig {
    pub cloud: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub use_managed_identity: bool,
    pub user_assigned_identity_id: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("cloud", &self.cloud)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("use_managed_identity", &self.use_managed_identity)
            .field("user_assigned_identity_id", &self.user_assigned_identity_id)
            .finish()
    }
}

impl AuthConfig {
    /// Parse secret data. Missing keys become empty strings / `false`.
    pub fn from_secret_data(data: &BTreeMap<String, ByteString>) -> Result<Self, SignerError> {
        let text = |key: &str| -> String {
            data.get(key)
                .map(|value| String::from_utf8_lossy(&value.0).into_owned())
                .unwrap_or_default()
        };

        let use_managed_identity = {
            let raw = text(KEY_USE_MANAGED_IDENTITY);
            if raw.is_empty() {
                false
            } else {
                parse_bool(&raw).ok_or(SignerError::Config {
                    key: KEY_USE_MANAGED_IDENTITY,
                    value: raw,
                })?
            }
        };

        Ok(Self {
            cloud: text(KEY_CLOUD),
            tenant_id: text(KEY_TENANT_ID),
            client_id: text(KEY_CLIENT_ID),
            client_secret: text(KEY_CLIENT_SECRET),
            use_managed_identity,
            user_assigned_identity_id: text(KEY_USER_ASSIGNED_IDENTITY),
        })
    }

    /// Secret data that parses back into this config
    pub fn to_secret_data(&self) -> BTreeMap<String, ByteString> {
        let entry = |key: &str, value: &str| (key.to_string(), ByteString(value.as_bytes().to_vec()));
        BTreeMap::from([
            entry(KEY_CLOUD, &self.cloud),
            entry(KEY_TENANT_ID, &self.tenant_id),
            entry(KEY_CLIENT_ID, &self.client_id),
            entry(KEY_CLIENT_SECRET, &self.client_secret),
            entry(
                KEY_USE_MANAGED_IDENTITY,
                if self.use_managed_identity { "true" } else { "false" },
            ),
            entry(KEY_USER_ASSIGNED_IDENTITY, &self.user_assigned_identity_id),
        ])
    }
}

/// Boolean spellings accepted by Kubernetes tooling
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
