//! # Issuer References
//!
//! Resolves `issuerRef.{group, kind}` of a CertificateRequest to one of the issuer
//! variants served by this controller. The registry is an explicit object built at
//! startup and handed to the reconciler, so tests can register alternative kinds.
//!
//! | Variant         | Lookup key                   | Secret namespace              |
//! |-----------------|------------------------------|-------------------------------|
//! | `Issuer`        | request namespace + name     | request namespace             |
//! | `ClusterIssuer` | name (cluster-scoped)        | cluster resource namespace    |

use crate::constants::{CLUSTER_ISSUER_KIND, ISSUER_GROUP, ISSUER_KIND};
use crate::controller::conditions::get_condition;
use crate::controller::store::ObjectKey;
use crate::crd::{
    ClusterIssuer, Condition, Issuer, IssuerSpec, IssuerStatus, CONDITION_READY,
};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuerKind {
    Issuer,
    ClusterIssuer,
}

impl IssuerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issuer => ISSUER_KIND,
            Self::ClusterIssuer => CLUSTER_ISSUER_KIND,
        }
    }

    /// Key under which the issuer object is stored
    pub fn lookup_key(self, request_namespace: &str, issuer_name: &str) -> ObjectKey {
        match self {
            Self::Issuer => ObjectKey::namespaced(request_namespace, issuer_name),
            Self::ClusterIssuer => ObjectKey::cluster(issuer_name),
        }
    }

    /// Namespace the issuer's auth secret is read from
    pub fn secret_namespace<'a>(
        self,
        request_namespace: &'a str,
        cluster_resource_namespace: &'a str,
    ) -> &'a str {
        match self {
            Self::Issuer => request_namespace,
            Self::ClusterIssuer => cluster_resource_namespace,
        }
    }
}

impl fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit `(group, kind) -> IssuerKind` map
#[derive(Debug, Clone)]
pub struct IssuerRegistry {
    group: String,
    kinds: HashMap<String, IssuerKind>,
}

impl IssuerRegistry {
    /// Empty registry for the given API group
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kinds: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>, issuer_kind: IssuerKind) -> Self {
        self.kinds.insert(kind.into(), issuer_kind);
        self
    }

    /// The kinds served by this controller under `azure-issuer.microsoft.com`
    pub fn azure_keyvault() -> Self {
        Self::new(ISSUER_GROUP)
            .with_kind(ISSUER_KIND, IssuerKind::Issuer)
            .with_kind(CLUSTER_ISSUER_KIND, IssuerKind::ClusterIssuer)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn owns_group(&self, group: &str) -> bool {
        self.group == group
    }

    /// Kind names are matched exactly, as the API server does
    pub fn resolve(&self, kind: &str) -> Option<IssuerKind> {
        self.kinds.get(kind).copied()
    }
}

impl Default for IssuerRegistry {
    fn default() -> Self {
        Self::azure_keyvault()
    }
}

/// A fetched issuer object of either variant
#[derive(Debug, Clone)]
pub enum IssuerObject {
    Issuer(Issuer),
    ClusterIssuer(ClusterIssuer),
}

/// Uniform view over an issuer's spec fields and Ready condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerSpecStatus {
    pub auth_secret_name: String,
    pub keyvault_name: String,
    pub issuer_name: String,
    pub ready: Option<Condition>,
}

impl IssuerSpecStatus {
    pub fn is_ready(&self) -> bool {
        self.ready.as_ref().is_some_and(Condition::is_true)
    }
}

impl IssuerObject {
    pub fn kind(&self) -> IssuerKind {
        match self {
            Self::Issuer(_) => IssuerKind::Issuer,
            Self::ClusterIssuer(_) => IssuerKind::ClusterIssuer,
        }
    }

    pub fn name(&self) -> &str {
        let name = match self {
            Self::Issuer(issuer) => issuer.metadata.name.as_deref(),
            Self::ClusterIssuer(issuer) => issuer.metadata.name.as_deref(),
        };
        name.unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Issuer(issuer) => issuer.metadata.namespace.as_deref(),
            Self::ClusterIssuer(_) => None,
        }
    }

    pub fn spec(&self) -> IssuerSpec {
        match self {
            Self::Issuer(issuer) => issuer.spec.clone(),
            Self::ClusterIssuer(issuer) => IssuerSpec::from(&issuer.spec),
        }
    }

    pub fn status(&self) -> Option<&IssuerStatus> {
        match self {
            Self::Issuer(issuer) => issuer.status.as_ref(),
            Self::ClusterIssuer(issuer) => issuer.status.as_ref(),
        }
    }

    /// Mutable status, created on first access
    pub fn status_mut(&mut self) -> &mut IssuerStatus {
        match self {
            Self::Issuer(issuer) => issuer.status.get_or_insert_with(IssuerStatus::default),
            Self::ClusterIssuer(issuer) => issuer.status.get_or_insert_with(IssuerStatus::default),
        }
    }

    /// Extract the fields the signer needs.
    ///
    /// Fails only when the object is not the variant `expected`. Empty fields are
    /// left to the secret fetch and signer construction, which report them as
    /// retryable.
    pub fn spec_and_status(&self, expected: IssuerKind) -> Result<IssuerSpecStatus, String> {
        if self.kind() != expected {
            return Err(format!(
                "expected {expected} but store returned {}",
                self.kind()
            ));
        }

        let spec = self.spec();
        Ok(IssuerSpecStatus {
            auth_secret_name: spec.auth_secret_name,
            keyvault_name: spec.keyvault_name,
            issuer_name: spec.issuer_name,
            ready: self
                .status()
                .and_then(|status| get_condition(status, CONDITION_READY))
                .cloned(),
        })
    }
}
