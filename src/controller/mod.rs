//! # Controller
//!
//! Core reconciliation modules.
//!
//! - `backoff`: Fibonacci backoff for retries
//! - `clock`: injectable time source for condition timestamps
//! - `conditions`: condition bookkeeping on resource status
//! - `issuer_ref`: issuer kinds, lookup and spec extraction
//! - `reconciler`: CertificateRequest and issuer reconciliation
//! - `store`: Kubernetes object access behind a trait

pub mod backoff;
pub mod clock;
pub mod conditions;
pub mod issuer_ref;
pub mod reconciler;
pub mod store;
