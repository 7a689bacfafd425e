//! # Issuer and ClusterIssuer
//!
//! Custom resources pointing cert-manager at an Azure Key Vault certificate issuer.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: azure-issuer.microsoft.com/v1alpha1
//! kind: Issuer
//! metadata:
//!   name: keyvault
//!   namespace: apps
//! spec:
//!   keyvaultName: my-vault1
//!   issuerName: digicert
//!   authSecretName: keyvault-credentials
//! ```

use super::condition::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Namespaced issuer; its auth secret lives next to it
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    kind = "Issuer",
    group = "azure-issuer.microsoft.com",
    version = "v1alpha1",
    namespaced,
    status = "IssuerStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Vault", "type":"string", "jsonPath":".spec.keyvaultName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSpec {
    /// Name of the Key Vault holding the certificate issuer (3-24 chars, `[-A-Za-z0-9]`)
    pub keyvault_name: String,
    /// Name of the certificate issuer configured inside the Key Vault
    pub issuer_name: String,
    /// Secret carrying the Azure credentials (`tenantID`, `aadClientID`, ...)
    pub auth_secret_name: String,
}

/// Cluster-scoped issuer; its auth secret lives in the cluster resource namespace
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    kind = "ClusterIssuer",
    group = "azure-issuer.microsoft.com",
    version = "v1alpha1",
    status = "IssuerStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Vault", "type":"string", "jsonPath":".spec.keyvaultName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIssuerSpec {
    /// Name of the Key Vault holding the certificate issuer (3-24 chars, `[-A-Za-z0-9]`)
    pub keyvault_name: String,
    /// Name of the certificate issuer configured inside the Key Vault
    pub issuer_name: String,
    /// Secret in the cluster resource namespace carrying the Azure credentials
    pub auth_secret_name: String,
}

impl From<&ClusterIssuerSpec> for IssuerSpec {
    fn from(spec: &ClusterIssuerSpec) -> Self {
        Self {
            keyvault_name: spec.keyvault_name.clone(),
            issuer_name: spec.issuer_name.clone(),
            auth_secret_name: spec.auth_secret_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuerStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
