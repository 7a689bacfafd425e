//! # Configuration
//!
//! Process-level settings. The reconciliation core only sees the subset it
//! needs through [`crate::controller::reconciler::ReconcilerOptions`].

mod controller;

pub use controller::{read_in_cluster_namespace, ConfigError, ControllerConfig};
