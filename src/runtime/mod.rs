//! # Runtime
//!
//! Process wiring around the reconcilers.
//!
//! - `initialization`: rustls, logging, metrics, probe server and Kubernetes client setup
//! - `watch_loop`: kube-runtime controllers for CertificateRequests and both issuer kinds
//! - `error_policy`: per-object Fibonacci requeue after retryable errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::{run_watch_loop, ControllerContext};
