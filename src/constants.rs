//! # Constants
//!
//! Shared constants used throughout the issuer.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the `Issuer` and `ClusterIssuer` resources served by this controller
pub const ISSUER_GROUP: &str = "azure-issuer.microsoft.com";

/// API version of the `Issuer` and `ClusterIssuer` resources
pub const ISSUER_VERSION: &str = "v1alpha1";

/// Kind name of the namespaced issuer
pub const ISSUER_KIND: &str = "Issuer";

/// Kind name of the cluster-scoped issuer
pub const CLUSTER_ISSUER_KIND: &str = "ClusterIssuer";

/// Field manager / user agent reported to the API server and Key Vault
pub const CONTROLLER_NAME: &str = "azure-keyvault-issuer";

/// Service account namespace file used to detect the cluster resource namespace
pub const IN_CLUSTER_NAMESPACE_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default minimum error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default upper bound for a single reconciliation, including every Key Vault call
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Key Vault REST API version used for certificate operations
pub const KEYVAULT_API_VERSION: &str = "7.4";
