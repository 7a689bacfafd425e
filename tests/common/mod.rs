//! Common test utilities
//!
//! In-memory `ResourceStore`, scripted `SignerBuilder`, a static token
//! credential for Pact tests and builders for the resources under test.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret as AzureSecret, TokenCredential, TokenRequestOptions};
use azure_keyvault_issuer::controller::issuer_ref::{IssuerKind, IssuerObject};
use azure_keyvault_issuer::controller::store::{ObjectKey, ResourceStore, StoreError};
use azure_keyvault_issuer::crd::{
    CertificateRequest, CertificateRequestSpec, CertificateRequestStatus, ClusterIssuer,
    ClusterIssuerSpec, Condition, ConditionStatus, Issuer, IssuerReference, IssuerSpec,
    IssuerStatus, CONDITION_APPROVED, CONDITION_DENIED, CONDITION_READY,
};
use azure_keyvault_issuer::signer::{Signer, SignerBuilder, SignerError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio_util::sync::CancellationToken;

pub const GROUP: &str = "azure-issuer.microsoft.com";
pub const NAMESPACE: &str = "apps";
pub const CLUSTER_RESOURCE_NAMESPACE: &str = "cert-manager";
pub const REQUEST_NAME: &str = "web-1";
pub const ISSUER_NAME: &str = "kv";
pub const SECRET_NAME: &str = "kv-credentials";
pub const VAULT_NAME: &str = "my-vault1";
pub const KEYVAULT_ISSUER: &str = "digicert";

static RUSTLS_INIT: Once = Once::new();

/// Install the ring crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// PEM CSR for `common_name` with the given DNS SANs
pub fn csr_pem(common_name: &str, dns_names: &[&str]) -> String {
    let key = rcgen::KeyPair::generate().expect("key pair");
    let mut params = rcgen::CertificateParams::new(
        dns_names.iter().map(|n| (*n).to_string()).collect::<Vec<_>>(),
    )
    .expect("csr params");
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params
        .serialize_request(&key)
        .expect("csr")
        .pem()
        .expect("csr pem")
}

pub fn condition(type_: &str, status: ConditionStatus) -> Condition {
    Condition {
        r#type: type_.to_string(),
        status,
        last_transition_time: Some("2023-12-31T00:00:00Z".to_string()),
        reason: Some("Test".to_string()),
        message: Some("set by test".to_string()),
    }
}

pub fn request_key() -> ObjectKey {
    ObjectKey::namespaced(NAMESPACE, REQUEST_NAME)
}

pub fn issuer_key() -> ObjectKey {
    ObjectKey::namespaced(NAMESPACE, ISSUER_NAME)
}

pub fn cluster_issuer_key() -> ObjectKey {
    ObjectKey::cluster(ISSUER_NAME)
}

/// Request against `kind`/`GROUP` carrying the given conditions
pub fn request(kind: &str, conditions: Vec<Condition>) -> CertificateRequest {
    CertificateRequest {
        metadata: ObjectMeta {
            name: Some(REQUEST_NAME.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            resource_version: Some("1".to_string()),
            ..ObjectMeta::default()
        },
        spec: CertificateRequestSpec {
            issuer_ref: IssuerReference {
                name: ISSUER_NAME.to_string(),
                kind: kind.to_string(),
                group: GROUP.to_string(),
            },
            request: ByteString(csr_pem("web.example.com", &["web.example.com"]).into_bytes()),
            duration: None,
            is_ca: false,
            usages: Vec::new(),
        },
        status: Some(CertificateRequestStatus {
            conditions,
            ..CertificateRequestStatus::default()
        }),
    }
}

pub fn approved() -> Condition {
    condition(CONDITION_APPROVED, ConditionStatus::True)
}

pub fn denied() -> Condition {
    condition(CONDITION_DENIED, ConditionStatus::True)
}

pub fn ready(status: ConditionStatus) -> Condition {
    condition(CONDITION_READY, status)
}

/// Approved request that already went through initialization
pub fn initialized_request(kind: &str) -> CertificateRequest {
    request(kind, vec![approved(), ready(ConditionStatus::False)])
}

fn issuer_spec() -> IssuerSpec {
    IssuerSpec {
        keyvault_name: VAULT_NAME.to_string(),
        issuer_name: KEYVAULT_ISSUER.to_string(),
        auth_secret_name: SECRET_NAME.to_string(),
    }
}

fn issuer_status(ready_status: Option<ConditionStatus>) -> Option<IssuerStatus> {
    ready_status.map(|status| IssuerStatus {
        conditions: vec![ready(status)],
    })
}

pub fn issuer(ready_status: Option<ConditionStatus>) -> Issuer {
    Issuer {
        metadata: ObjectMeta {
            name: Some(ISSUER_NAME.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            resource_version: Some("7".to_string()),
            ..ObjectMeta::default()
        },
        spec: issuer_spec(),
        status: issuer_status(ready_status),
    }
}

pub fn cluster_issuer(ready_status: Option<ConditionStatus>) -> ClusterIssuer {
    let spec = issuer_spec();
    ClusterIssuer {
        metadata: ObjectMeta {
            name: Some(ISSUER_NAME.to_string()),
            resource_version: Some("7".to_string()),
            ..ObjectMeta::default()
        },
        spec: ClusterIssuerSpec {
            keyvault_name: spec.keyvault_name,
            issuer_name: spec.issuer_name,
            auth_secret_name: spec.auth_secret_name,
        },
        status: issuer_status(ready_status),
    }
}

pub fn auth_secret(namespace: &str) -> Secret {
    let mut data = BTreeMap::new();
    data.insert("tenantID".to_string(), ByteString(b"tenant".to_vec()));
    data.insert("aadClientID".to_string(), ByteString(b"client".to_vec()));
    data.insert("aadClientSecret".to_string(), ByteString(b"s3cret".to_vec()));
    Secret {
        metadata: ObjectMeta {
            name: Some(SECRET_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..Secret::default()
    }
}

fn issuer_slot(kind: IssuerKind, key: &ObjectKey) -> String {
    format!("{kind}:{key}")
}

/// In-memory `ResourceStore` that records every status write
#[derive(Default)]
pub struct MemoryStore {
    requests: Mutex<HashMap<ObjectKey, CertificateRequest>>,
    issuers: Mutex<HashMap<String, IssuerObject>>,
    secrets: Mutex<HashMap<ObjectKey, Secret>>,
    request_writes: AtomicUsize,
    issuer_writes: AtomicUsize,
    conflict_on_write: AtomicBool,
    cancel_on_secret_fetch: Mutex<Option<CancellationToken>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_request(&self, request: CertificateRequest) {
        let key = ObjectKey::namespaced(
            request.metadata.namespace.clone().unwrap_or_default(),
            request.metadata.name.clone().unwrap_or_default(),
        );
        self.requests.lock().unwrap().insert(key, request);
    }

    pub fn put_issuer(&self, issuer: Issuer) {
        let key = ObjectKey::namespaced(
            issuer.metadata.namespace.clone().unwrap_or_default(),
            issuer.metadata.name.clone().unwrap_or_default(),
        );
        self.issuers
            .lock()
            .unwrap()
            .insert(issuer_slot(IssuerKind::Issuer, &key), IssuerObject::Issuer(issuer));
    }

    pub fn put_cluster_issuer(&self, issuer: ClusterIssuer) {
        let key = ObjectKey::cluster(issuer.metadata.name.clone().unwrap_or_default());
        self.issuers.lock().unwrap().insert(
            issuer_slot(IssuerKind::ClusterIssuer, &key),
            IssuerObject::ClusterIssuer(issuer),
        );
    }

    pub fn put_secret(&self, secret: Secret) {
        let key = ObjectKey::namespaced(
            secret.metadata.namespace.clone().unwrap_or_default(),
            secret.metadata.name.clone().unwrap_or_default(),
        );
        self.secrets.lock().unwrap().insert(key, secret);
    }

    pub fn request(&self, key: &ObjectKey) -> CertificateRequest {
        self.requests
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .expect("request stored")
    }

    pub fn issuer_object(&self, kind: IssuerKind, key: &ObjectKey) -> IssuerObject {
        self.issuers
            .lock()
            .unwrap()
            .get(&issuer_slot(kind, key))
            .cloned()
            .expect("issuer stored")
    }

    pub fn request_writes(&self) -> usize {
        self.request_writes.load(Ordering::SeqCst)
    }

    pub fn issuer_writes(&self) -> usize {
        self.issuer_writes.load(Ordering::SeqCst)
    }

    /// Reject every status write as if the object changed underneath
    pub fn fail_writes_with_conflict(&self) {
        self.conflict_on_write.store(true, Ordering::SeqCst);
    }

    /// Cancel `token` while the auth secret is being fetched
    pub fn cancel_on_secret_fetch(&self, token: CancellationToken) {
        *self.cancel_on_secret_fetch.lock().unwrap() = Some(token);
    }

    fn check_conflict(&self, kind: &'static str, key: ObjectKey) -> Result<(), StoreError> {
        if self.conflict_on_write.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict { kind, key });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_certificate_request(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<CertificateRequest>, StoreError> {
        Ok(self.requests.lock().unwrap().get(key).cloned())
    }

    async fn get_issuer(
        &self,
        kind: IssuerKind,
        key: &ObjectKey,
    ) -> Result<IssuerObject, StoreError> {
        self.issuers
            .lock()
            .unwrap()
            .get(&issuer_slot(kind, key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: kind.as_str(),
                key: key.clone(),
            })
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, StoreError> {
        if let Some(token) = self.cancel_on_secret_fetch.lock().unwrap().as_ref() {
            token.cancel();
        }
        self.secrets
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "Secret",
                key: key.clone(),
            })
    }

    async fn update_certificate_request_status(
        &self,
        request: &CertificateRequest,
    ) -> Result<(), StoreError> {
        self.request_writes.fetch_add(1, Ordering::SeqCst);
        let key = ObjectKey::namespaced(
            request.metadata.namespace.clone().unwrap_or_default(),
            request.metadata.name.clone().unwrap_or_default(),
        );
        self.check_conflict("CertificateRequest", key.clone())?;
        self.requests.lock().unwrap().insert(key, request.clone());
        Ok(())
    }

    async fn update_issuer_status(&self, issuer: &IssuerObject) -> Result<(), StoreError> {
        self.issuer_writes.fetch_add(1, Ordering::SeqCst);
        let key = match issuer.namespace() {
            Some(namespace) => ObjectKey::namespaced(namespace, issuer.name()),
            None => ObjectKey::cluster(issuer.name()),
        };
        self.check_conflict(issuer.kind().as_str(), key.clone())?;
        self.issuers
            .lock()
            .unwrap()
            .insert(issuer_slot(issuer.kind(), &key), issuer.clone());
        Ok(())
    }
}

/// What the scripted signer does
#[derive(Debug, Clone)]
pub enum SignBehavior {
    Certificate(Vec<u8>),
    /// Key Vault operation still running
    Pending,
    /// Key Vault rejected the request
    Reject(String),
    /// The auth secret could not be turned into a signer
    BuildError,
}

/// `SignerBuilder` whose signers follow a script and record their inputs
#[derive(Debug)]
pub struct ScriptedSigners {
    behavior: Mutex<SignBehavior>,
    builds: Mutex<Vec<(BTreeMap<String, ByteString>, String)>>,
    signed: Arc<Mutex<Vec<(Vec<u8>, String, String)>>>,
    checked: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSigners {
    pub fn new(behavior: SignBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            builds: Mutex::new(Vec::new()),
            signed: Arc::new(Mutex::new(Vec::new())),
            checked: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn set_behavior(&self, behavior: SignBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// `(secret data, vault name)` of every build
    pub fn builds(&self) -> Vec<(BTreeMap<String, ByteString>, String)> {
        self.builds.lock().unwrap().clone()
    }

    /// `(csr, certificate name, Key Vault issuer)` of every sign call
    pub fn signed(&self) -> Vec<(Vec<u8>, String, String)> {
        self.signed.lock().unwrap().clone()
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

impl SignerBuilder for ScriptedSigners {
    fn build(
        &self,
        secret_data: &BTreeMap<String, ByteString>,
        vault_name: &str,
    ) -> Result<Box<dyn Signer>, SignerError> {
        self.builds
            .lock()
            .unwrap()
            .push((secret_data.clone(), vault_name.to_string()));
        let behavior = self.behavior.lock().unwrap().clone();
        if matches!(behavior, SignBehavior::BuildError) {
            return Err(SignerError::NoCredentials);
        }
        Ok(Box::new(ScriptedSigner {
            behavior,
            signed: Arc::clone(&self.signed),
            checked: Arc::clone(&self.checked),
        }))
    }
}

struct ScriptedSigner {
    behavior: SignBehavior,
    signed: Arc<Mutex<Vec<(Vec<u8>, String, String)>>>,
    checked: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Signer for ScriptedSigner {
    async fn sign(
        &self,
        csr: &[u8],
        name: &str,
        issuer_name: &str,
    ) -> Result<Vec<u8>, SignerError> {
        self.signed.lock().unwrap().push((
            csr.to_vec(),
            name.to_string(),
            issuer_name.to_string(),
        ));
        match &self.behavior {
            SignBehavior::Certificate(der) => Ok(der.clone()),
            SignBehavior::Pending => Err(SignerError::Pending {
                name: name.to_string(),
                status: "inProgress".to_string(),
            }),
            SignBehavior::Reject(message) => Err(SignerError::Backend {
                status: 400,
                message: message.clone(),
            }),
            SignBehavior::BuildError => Err(SignerError::NoCredentials),
        }
    }

    async fn check_issuer(&self, issuer_name: &str) -> Result<(), SignerError> {
        self.checked.lock().unwrap().push(issuer_name.to_string());
        match &self.behavior {
            SignBehavior::Reject(message) => Err(SignerError::Backend {
                status: 404,
                message: message.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Credential that always hands out `test-token`
#[derive(Debug)]
pub struct StaticTokenCredential;

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        Ok(AccessToken::new(
            AzureSecret::new("test-token".to_string()),
            typespec_client_core::time::OffsetDateTime::now_utc()
                + typespec_client_core::time::Duration::hours(1),
        ))
    }
}
