//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use azure_keyvault_issuer::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::controller::clock::{Clock, FixedClock, SystemClock};
pub use crate::controller::issuer_ref::{IssuerKind, IssuerObject, IssuerRegistry};
pub use crate::controller::reconciler::{
    CertificateRequestReconciler, IgnoreReason, IssuerReconciler, ReconcileError,
    ReconcileOutcome, ReconcilerOptions,
};
pub use crate::controller::store::{KubeStore, ObjectKey, ResourceStore, StoreError};

pub use crate::config::ControllerConfig;

pub use crate::signer::{
    AuthConfig, CloudEnvironment, KeyVaultSigner, KeyVaultSignerBuilder, Signer, SignerBuilder,
    SignerError,
};
