//! # Token Provider
//!
//! Picks a credential for Key Vault from the auth config. Strategies are tried
//! in order and the first whose predicate matches wins:
//!
//! 1. managed identity with a user-assigned identity ID
//! 2. managed identity (system-assigned)
//! 3. service principal (client ID + client secret) against the cloud's AAD endpoint
//!
//! No token is requested until the signer makes its first Key Vault call.

use super::cloud::CloudEnvironment;
use super::config::AuthConfig;
use super::error::SignerError;
use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_core::error::ErrorKind;
use azure_identity::{ManagedIdentityCredential, ManagedIdentityCredentialOptions, UserAssignedId};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use typespec_client_core::time::{Duration, OffsetDateTime};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStrategy {
    UserAssignedManagedIdentity,
    SystemAssignedManagedIdentity,
    ServicePrincipal,
}

impl CredentialStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserAssignedManagedIdentity => "user-assigned managed identity",
            Self::SystemAssignedManagedIdentity => "system-assigned managed identity",
            Self::ServicePrincipal => "service principal",
        }
    }
}

impl fmt::Display for CredentialStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Predicate = fn(&AuthConfig) -> bool;
type Constructor =
    fn(&AuthConfig, &CloudEnvironment) -> Result<Arc<dyn TokenCredential>, SignerError>;

const STRATEGIES: [(CredentialStrategy, Predicate, Constructor); 3] = [
    (
        CredentialStrategy::UserAssignedManagedIdentity,
        uses_user_assigned_identity,
        user_assigned_managed_identity,
    ),
    (
        CredentialStrategy::SystemAssignedManagedIdentity,
        uses_managed_identity,
        system_assigned_managed_identity,
    ),
    (
        CredentialStrategy::ServicePrincipal,
        has_client_secret,
        service_principal,
    ),
];

fn uses_user_assigned_identity(config: &AuthConfig) -> bool {
    config.use_managed_identity && !config.user_assigned_identity_id.is_empty()
}

fn uses_managed_identity(config: &AuthConfig) -> bool {
    config.use_managed_identity
}

fn has_client_secret(config: &AuthConfig) -> bool {
    !config.client_id.is_empty() && !config.client_secret.is_empty()
}

fn user_assigned_managed_identity(
    config: &AuthConfig,
    _env: &CloudEnvironment,
) -> Result<Arc<dyn TokenCredential>, SignerError> {
    let options = ManagedIdentityCredentialOptions {
        user_assigned_id: Some(UserAssignedId::ClientId(
            config.user_assigned_identity_id.clone(),
        )),
        ..Default::default()
    };
    let credential: Arc<dyn TokenCredential> = ManagedIdentityCredential::new(Some(options))
        .map_err(|e| SignerError::Credential {
            strategy: CredentialStrategy::UserAssignedManagedIdentity.as_str(),
            message: e.to_string(),
        })?;
    Ok(credential)
}

fn system_assigned_managed_identity(
    _config: &AuthConfig,
    _env: &CloudEnvironment,
) -> Result<Arc<dyn TokenCredential>, SignerError> {
    let credential: Arc<dyn TokenCredential> =
        ManagedIdentityCredential::new(None).map_err(|e| SignerError::Credential {
            strategy: CredentialStrategy::SystemAssignedManagedIdentity.as_str(),
            message: e.to_string(),
        })?;
    Ok(credential)
}

fn service_principal(
    config: &AuthConfig,
    env: &CloudEnvironment,
) -> Result<Arc<dyn TokenCredential>, SignerError> {
    let credential = ServicePrincipalCredential::new(
        env.active_directory_endpoint,
        &config.tenant_id,
        &config.client_id,
        &config.client_secret,
    )?;
    Ok(Arc::new(credential))
}

/// Bearer tokens for one Key Vault resource
#[derive(Clone)]
pub struct TokenSource {
    strategy: CredentialStrategy,
    credential: Arc<dyn TokenCredential>,
    resource: String,
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSource")
            .field("strategy", &self.strategy)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    /// Select a credential strategy; `resource` is the Key Vault endpoint without trailing slash
    pub fn build(
        config: &AuthConfig,
        env: &CloudEnvironment,
        resource: &str,
    ) -> Result<Self, SignerError> {
        let (strategy, _, constructor) = STRATEGIES
            .iter()
            .find(|(_, applies, _)| applies(config))
            .ok_or(SignerError::NoCredentials)?;

        debug!(strategy = %strategy, resource = %resource, "Selected Key Vault credential");
        Ok(Self {
            strategy: *strategy,
            credential: constructor(config, env)?,
            resource: resource.trim_end_matches('/').to_string(),
        })
    }

    /// Wrap an existing credential
    pub fn from_credential(
        strategy: CredentialStrategy,
        credential: Arc<dyn TokenCredential>,
        resource: &str,
    ) -> Self {
        Self {
            strategy,
            credential,
            resource: resource.trim_end_matches('/').to_string(),
        }
    }

    pub fn strategy(&self) -> CredentialStrategy {
        self.strategy
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Request a fresh access token for the resource
    pub async fn bearer_token(&self) -> Result<Zeroizing<String>, SignerError> {
        let scope = format!("{}/.default", self.resource);
        let token = self
            .credential
            .get_token(&[scope.as_str()], Some(TokenRequestOptions::default()))
            .await
            .map_err(SignerError::Token)?;
        Ok(Zeroizing::new(token.token.secret().to_string()))
    }
}

/// Client-credentials grant against the AAD v1 token endpoint
pub struct ServicePrincipalCredential {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Zeroizing<String>,
}

impl fmt::Debug for ServicePrincipalCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipalCredential")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds; AAD v1 sends it as a string
    #[serde(default)]
    expires_in: serde_json::Value,
}

impl ServicePrincipalCredential {
    pub fn new(
        authority: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, SignerError> {
        if tenant_id.is_empty() {
            return Err(SignerError::Credential {
                strategy: CredentialStrategy::ServicePrincipal.as_str(),
                message: "tenantID is required".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SignerError::Credential {
                strategy: CredentialStrategy::ServicePrincipal.as_str(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            token_url: Self::token_url(authority, tenant_id),
            client_id: client_id.to_string(),
            client_secret: Zeroizing::new(client_secret.to_string()),
        })
    }

    fn token_url(authority: &str, tenant_id: &str) -> String {
        format!("{}/{tenant_id}/oauth2/token", authority.trim_end_matches('/'))
    }
}

#[async_trait]
impl TokenCredential for ServicePrincipalCredential {
    async fn get_token(
        &self,
        scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        let resource = scopes
            .first()
            .map(|scope| scope.trim_end_matches("/.default"))
            .unwrap_or_default();

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("resource", resource),
            ])
            .send()
            .await
            .map_err(|e| azure_core::Error::new(ErrorKind::Credential, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(azure_core::Error::new(
                ErrorKind::Credential,
                format!("AAD token request failed with HTTP {status}: {body}"),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| azure_core::Error::new(ErrorKind::Credential, e))?;
        let expires_in = match &token.expires_in {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or(3600);

        Ok(AccessToken::new(
            Secret::new(token.access_token),
            OffsetDateTime::now_utc() + Duration::seconds(expires_in),
        ))
    }
}
