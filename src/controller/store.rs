//! # Resource Store
//!
//! Narrow view of the Kubernetes API used by the reconcilers. `KubeStore` talks to
//! the API server; tests plug in an in-memory implementation.
//!
//! Status writes are merge patches that carry `metadata.resourceVersion`, so the
//! API server rejects them with `409 Conflict` when the object changed since it
//! was read.

use crate::constants::CONTROLLER_NAME;
use crate::controller::issuer_ref::{IssuerKind, IssuerObject};
use crate::crd::{CertificateRequest, ClusterIssuer, Issuer};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Namespace/name of an object; `namespace` is `None` for cluster-scoped objects
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },
    #[error("{kind} {key} was modified concurrently")]
    Conflict { kind: &'static str, key: ObjectKey },
    #[error("kubernetes API error: {0}")]
    Api(#[source] kube::Error),
    #[error("failed to serialize status patch: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn from_kube(error: kube::Error, kind: &'static str, key: &ObjectKey) -> Self {
        match error {
            kube::Error::Api(ref api_err) if api_err.code == 404 => Self::NotFound {
                kind,
                key: key.clone(),
            },
            kube::Error::Api(ref api_err) if api_err.code == 409 => Self::Conflict {
                kind,
                key: key.clone(),
            },
            other => Self::Api(other),
        }
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// `Ok(None)` when the request no longer exists
    async fn get_certificate_request(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<CertificateRequest>, StoreError>;

    async fn get_issuer(&self, kind: IssuerKind, key: &ObjectKey)
        -> Result<IssuerObject, StoreError>;

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, StoreError>;

    async fn update_certificate_request_status(
        &self,
        request: &CertificateRequest,
    ) -> Result<(), StoreError>;

    async fn update_issuer_status(&self, issuer: &IssuerObject) -> Result<(), StoreError>;
}

/// `ResourceStore` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PatchParams::default()
        }
    }

    fn status_patch<S: serde::Serialize>(
        resource_version: Option<&String>,
        status: &S,
    ) -> Result<Patch<serde_json::Value>, StoreError> {
        Ok(Patch::Merge(serde_json::json!({
            "metadata": { "resourceVersion": resource_version },
            "status": serde_json::to_value(status)?,
        })))
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_certificate_request(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<CertificateRequest>, StoreError> {
        let api: Api<CertificateRequest> =
            Api::namespaced(self.client.clone(), key.namespace_or_default());
        api.get_opt(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, "CertificateRequest", key))
    }

    async fn get_issuer(
        &self,
        kind: IssuerKind,
        key: &ObjectKey,
    ) -> Result<IssuerObject, StoreError> {
        match kind {
            IssuerKind::Issuer => {
                let api: Api<Issuer> =
                    Api::namespaced(self.client.clone(), key.namespace_or_default());
                api.get(&key.name)
                    .await
                    .map(IssuerObject::Issuer)
                    .map_err(|e| StoreError::from_kube(e, "Issuer", key))
            }
            IssuerKind::ClusterIssuer => {
                let api: Api<ClusterIssuer> = Api::all(self.client.clone());
                api.get(&key.name)
                    .await
                    .map(IssuerObject::ClusterIssuer)
                    .map_err(|e| StoreError::from_kube(e, "ClusterIssuer", key))
            }
        }
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), key.namespace_or_default());
        api.get(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", key))
    }

    async fn update_certificate_request_status(
        &self,
        request: &CertificateRequest,
    ) -> Result<(), StoreError> {
        let key = ObjectKey {
            namespace: request.metadata.namespace.clone(),
            name: request.metadata.name.clone().unwrap_or_default(),
        };
        let api: Api<CertificateRequest> =
            Api::namespaced(self.client.clone(), key.namespace_or_default());
        let patch = Self::status_patch(request.metadata.resource_version.as_ref(), &request.status)?;

        debug!(request = %key, "Patching CertificateRequest status");
        api.patch_status(&key.name, &Self::patch_params(), &patch)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, "CertificateRequest", &key))
    }

    async fn update_issuer_status(&self, issuer: &IssuerObject) -> Result<(), StoreError> {
        let params = Self::patch_params();

        match issuer {
            IssuerObject::Issuer(object) => {
                let key = ObjectKey {
                    namespace: object.metadata.namespace.clone(),
                    name: issuer.name().to_string(),
                };
                let api: Api<Issuer> =
                    Api::namespaced(self.client.clone(), key.namespace_or_default());
                let patch =
                    Self::status_patch(object.metadata.resource_version.as_ref(), &object.status)?;
                api.patch_status(&key.name, &params, &patch)
                    .await
                    .map(|_| ())
                    .map_err(|e| StoreError::from_kube(e, "Issuer", &key))
            }
            IssuerObject::ClusterIssuer(object) => {
                let key = ObjectKey::cluster(issuer.name());
                let api: Api<ClusterIssuer> = Api::all(self.client.clone());
                let patch =
                    Self::status_patch(object.metadata.resource_version.as_ref(), &object.status)?;
                api.patch_status(&key.name, &params, &patch)
                    .await
                    .map(|_| ())
                    .map_err(|e| StoreError::from_kube(e, "ClusterIssuer", &key))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::namespaced("apps", "web-1").to_string(), "apps/web-1");
        assert_eq!(ObjectKey::cluster("kv").to_string(), "kv");
    }

    #[test]
    fn test_status_patch_carries_resource_version() {
        let version = "42".to_string();
        let patch = KubeStore::status_patch(Some(&version), &serde_json::json!({"conditions": []}))
            .expect("serializable");
        let Patch::Merge(value) = patch else {
            panic!("expected merge patch");
        };
        assert_eq!(value["metadata"]["resourceVersion"], "42");
        assert_eq!(value["status"]["conditions"], serde_json::json!([]));
    }
}
