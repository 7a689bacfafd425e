//! # Key Vault Signer
//!
//! Issues certificates through a Key Vault certificate issuer using the
//! certificates REST API directly:
//!
//! - `GET  {vault}/certificates/{name}/pending` - resume an earlier request
//! - `POST {vault}/certificates/{name}/create`  - start a new request
//! - `GET  {vault}/certificates/{name}`         - read the issued certificate
//! - `GET  {vault}/certificates/issuers/{name}` - verify the issuer exists
//!
//! Issuance by a public CA can outlive a reconciliation. An `inProgress` operation
//! surfaces as [`SignerError::Pending`] and the next call picks the same operation
//! up again instead of creating a second one.

use super::cloud::CloudEnvironment;
use super::config::AuthConfig;
use super::csr::{decode_csr, CsrInfo};
use super::error::SignerError;
use super::token::TokenSource;
use super::vault::vault_url;
use super::{Signer, SignerBuilder};
use crate::constants::{CONTROLLER_NAME, KEYVAULT_API_VERSION};
use crate::observability::metrics;
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use k8s_openapi::ByteString;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

const STATUS_IN_PROGRESS: &str = "inProgress";
const STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Deserialize)]
struct CertificateOperation {
    #[serde(default)]
    status: String,
    #[serde(default)]
    status_details: Option<String>,
    #[serde(default)]
    error: Option<KeyVaultError>,
}

impl CertificateOperation {
    fn failure_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone())
            .or_else(|| self.status_details.clone())
            .unwrap_or_else(|| format!("certificate operation ended with status {}", self.status))
    }
}

#[derive(Debug, Deserialize)]
struct KeyVaultError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: KeyVaultError,
}

#[derive(Debug, Deserialize)]
struct CertificateBundle {
    #[serde(default)]
    cer: Option<String>,
}

/// Key Vault client bound to one vault
#[derive(Debug)]
pub struct KeyVaultSigner {
    http: reqwest::Client,
    vault_url: String,
    tokens: TokenSource,
}

impl KeyVaultSigner {
    /// `vault_url` may point at any Key Vault compatible endpoint
    pub fn new(vault_url: &str, tokens: TokenSource) -> Result<Self, SignerError> {
        let http = reqwest::Client::builder()
            .user_agent(CONTROLLER_NAME)
            .build()?;
        let mut vault_url = vault_url.to_string();
        if !vault_url.ends_with('/') {
            vault_url.push('/');
        }
        Ok(Self {
            http,
            vault_url,
            tokens,
        })
    }

    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    pub fn tokens(&self) -> &TokenSource {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{path}?api-version={KEYVAULT_API_VERSION}",
            self.vault_url
        )
    }

    async fn backend_error(response: reqwest::Response) -> SignerError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or(body);
        SignerError::Backend { status, message }
    }

    /// `None` when Key Vault has no operation for this certificate
    async fn pending_operation(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Option<CertificateOperation>, SignerError> {
        let response = self
            .http
            .get(self.url(&format!("certificates/{name}/pending")))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::backend_error(response).await);
        }
        Ok(Some(response.json().await?))
    }

    async fn create_certificate(
        &self,
        token: &str,
        name: &str,
        csr: &CsrInfo,
        issuer_name: &str,
    ) -> Result<CertificateOperation, SignerError> {
        let body = json!({
            "policy": {
                "x509_props": {
                    "subject": csr.subject,
                    "sans": { "dns_names": csr.dns_names },
                },
                "issuer": { "name": issuer_name },
            },
            "attributes": {},
        });

        let response = self
            .http
            .post(self.url(&format!("certificates/{name}/create")))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn issued_certificate(&self, token: &str, name: &str) -> Result<Vec<u8>, SignerError> {
        let response = self
            .http
            .get(self.url(&format!("certificates/{name}")))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response).await);
        }

        let bundle: CertificateBundle = response.json().await?;
        let cer = bundle.cer.ok_or_else(|| {
            SignerError::InvalidResponse(format!("certificate {name} has no cer field"))
        })?;
        STANDARD
            .decode(&cer)
            .or_else(|_| URL_SAFE_NO_PAD.decode(&cer))
            .map_err(|e| SignerError::InvalidResponse(format!("certificate {name}: {e}")))
    }

    async fn sign_inner(
        &self,
        csr: &[u8],
        name: &str,
        issuer_name: &str,
    ) -> Result<Vec<u8>, SignerError> {
        let csr = decode_csr(csr)?;
        let token = self.tokens.bearer_token().await?;

        let operation = match self.pending_operation(&token, name).await? {
            Some(operation)
                if operation.status == STATUS_IN_PROGRESS
                    || operation.status == STATUS_COMPLETED =>
            {
                debug!(
                    certificate = %name,
                    status = %operation.status,
                    "Resuming existing certificate operation"
                );
                operation
            }
            previous => {
                if let Some(previous) = previous {
                    warn!(
                        certificate = %name,
                        status = %previous.status,
                        "Previous certificate operation did not succeed, creating a new one"
                    );
                }
                info!(certificate = %name, issuer = %issuer_name, "Creating Key Vault certificate");
                self.create_certificate(&token, name, &csr, issuer_name)
                    .await?
            }
        };

        match operation.status.as_str() {
            STATUS_COMPLETED => self.issued_certificate(&token, name).await,
            STATUS_IN_PROGRESS => Err(SignerError::Pending {
                name: name.to_string(),
                status: operation.status,
            }),
            _ => Err(SignerError::Backend {
                status: 200,
                message: operation.failure_message(),
            }),
        }
    }
}

#[async_trait]
impl Signer for KeyVaultSigner {
    async fn sign(&self, csr: &[u8], name: &str, issuer_name: &str) -> Result<Vec<u8>, SignerError> {
        let span = info_span!(
            "keyvault.certificate.create",
            certificate = %name,
            issuer = %issuer_name,
            vault = %self.vault_url
        );
        let start = Instant::now();
        let result = self.sign_inner(csr, name, issuer_name).instrument(span).await;

        metrics::record_keyvault_operation("create_certificate", start.elapsed().as_secs_f64());
        match &result {
            Ok(_) => metrics::increment_certificates_issued(),
            Err(SignerError::Pending { .. }) => {}
            Err(_) => metrics::increment_keyvault_operation_errors("create_certificate"),
        }
        result
    }

    async fn check_issuer(&self, issuer_name: &str) -> Result<(), SignerError> {
        let span = info_span!(
            "keyvault.issuer.get",
            issuer = %issuer_name,
            vault = %self.vault_url
        );
        let start = Instant::now();

        let result = async {
            let token = self.tokens.bearer_token().await?;
            let response = self
                .http
                .get(self.url(&format!("certificates/issuers/{issuer_name}")))
                .bearer_auth(token.as_str())
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Self::backend_error(response).await);
            }
            Ok::<(), SignerError>(())
        }
        .instrument(span)
        .await;

        metrics::record_keyvault_operation("get_issuer", start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_keyvault_operation_errors("get_issuer");
        }
        result
    }
}

/// Builds a [`KeyVaultSigner`] from an issuer's auth secret
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyVaultSignerBuilder;

impl KeyVaultSignerBuilder {
    /// Parse the auth secret, resolve the cloud and vault URL, then pick a credential
    pub fn build_signer(
        &self,
        secret_data: &BTreeMap<String, ByteString>,
        vault_name: &str,
    ) -> Result<KeyVaultSigner, SignerError> {
        let config = AuthConfig::from_secret_data(secret_data)?;
        let env = CloudEnvironment::from_name(&config.cloud)?;
        let vault_url = vault_url(&env, vault_name)?;
        let tokens = TokenSource::build(&config, &env, env.key_vault_resource())?;
        KeyVaultSigner::new(&vault_url, tokens)
    }
}

impl SignerBuilder for KeyVaultSignerBuilder {
    fn build(
        &self,
        secret_data: &BTreeMap<String, ByteString>,
        vault_name: &str,
    ) -> Result<Box<dyn Signer>, SignerError> {
        Ok(Box::new(self.build_signer(secret_data, vault_name)?))
    }
}
