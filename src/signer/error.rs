use thiserror::Error;

/// Failures while building a signer or talking to Key Vault
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid value {value:?} for {key}, expected a boolean")]
    Config { key: &'static str, value: String },

    #[error("unknown cloud environment name {0:?}")]
    UnknownCloud(String),

    #[error("invalid vault name: {name:?}, must match [-a-zA-Z0-9]{{3,24}}")]
    InvalidVaultName { name: String },

    #[error("no credentials provided for accessing keyvault")]
    NoCredentials,

    #[error("failed to create {strategy} credential: {message}")]
    Credential {
        strategy: &'static str,
        message: String,
    },

    #[error("failed to decode CSR: {0}")]
    InvalidCsr(String),

    #[error("failed to acquire keyvault access token: {0}")]
    Token(#[source] azure_core::Error),

    #[error("keyvault request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Key Vault answered with an error status; `message` is Key Vault's own text
    #[error("keyvault returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("unexpected keyvault response: {0}")]
    InvalidResponse(String),

    #[error("certificate {name} is still {status} in keyvault")]
    Pending { name: String, status: String },
}

impl SignerError {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}
