//! Azure Key Vault Issuer Library
//!
//! A cert-manager external issuer. CertificateRequests that reference an
//! `Issuer` or `ClusterIssuer` of group `azure-issuer.microsoft.com` are
//! signed by creating a certificate through an Azure Key Vault certificate
//! issuer.
//!
//! ## Quick Start
//!
//! ```rust
//! use azure_keyvault_issuer::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod signer;
