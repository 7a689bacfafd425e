//! # Signer
//!
//! Everything needed to turn an issuer's auth secret into an authenticated Key
//! Vault client:
//!
//! - `config.rs` - auth config parsed from secret data
//! - `cloud.rs` - cloud environment table
//! - `vault.rs` - vault name validation and URL
//! - `token.rs` - credential strategy selection
//! - `csr.rs` - CSR decoding
//! - `keyvault.rs` - the Key Vault client itself
//!
//! A signer is built per reconciliation and dropped with it.

pub mod cloud;
pub mod config;
pub mod csr;
mod error;
pub mod keyvault;
pub mod token;
pub mod vault;

pub use cloud::CloudEnvironment;
pub use config::AuthConfig;
pub use error::SignerError;
pub use keyvault::{KeyVaultSigner, KeyVaultSignerBuilder};
pub use token::{CredentialStrategy, TokenSource};

use async_trait::async_trait;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// A certificate authority reachable with one set of credentials
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign `csr` as certificate `name` through the CA issuer `issuer_name`; returns the certificate bytes
    async fn sign(&self, csr: &[u8], name: &str, issuer_name: &str) -> Result<Vec<u8>, SignerError>;

    /// Verify the credentials can read the CA issuer `issuer_name`
    async fn check_issuer(&self, issuer_name: &str) -> Result<(), SignerError>;
}

/// Creates signers from secret data and a vault name
pub trait SignerBuilder: Send + Sync {
    fn build(
        &self,
        secret_data: &BTreeMap<String, ByteString>,
        vault_name: &str,
    ) -> Result<Box<dyn Signer>, SignerError>;
}
