//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_METRICS_PORT,
    DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_SERVER_POLL_INTERVAL_MS,
    DEFAULT_SERVER_STARTUP_TIMEOUT_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
    IN_CLUSTER_NAMESPACE_PATH,
};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither the environment nor the service account mount names a namespace
    #[error("not running in-cluster, please supply --cluster-resource-namespace")]
    NotInCluster,
    #[error("error reading namespace file {path}: {source}")]
    NamespaceFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace holding the auth secrets of cluster-scoped issuers
    /// Empty means "detect from the service account mount"
    pub cluster_resource_namespace: String,
    /// Only sign CertificateRequests that an approver marked `Approved`
    pub check_approved_condition: bool,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// HTTP server startup timeout (seconds)
    pub server_startup_timeout_secs: u64,
    /// HTTP server readiness poll interval (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Minimum delay before retrying a failed reconciliation (seconds)
    pub backoff_min_secs: u64,
    /// Maximum delay between retries (seconds)
    pub backoff_max_secs: u64,
    /// Upper bound for one reconciliation; in-flight Key Vault calls are cancelled past it
    pub reconcile_timeout_secs: u64,
    /// Delay before restarting a watch stream that ended (seconds)
    pub watch_restart_delay_secs: u64,
    /// Maximum concurrent reconciliations per controller (0 = unbounded)
    pub max_concurrent_reconciliations: u16,
    /// Global log filter (ERROR, WARN, INFO, DEBUG, TRACE or a full `EnvFilter` directive)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cluster_resource_namespace: String::new(),
            check_approved_condition: true,
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            max_concurrent_reconciliations: 10,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            cluster_resource_namespace: lookup("CLUSTER_RESOURCE_NAMESPACE")
                .unwrap_or(defaults.cluster_resource_namespace),
            check_approved_condition: parse_or(
                lookup("CHECK_APPROVED_CONDITION"),
                defaults.check_approved_condition,
                parse_flag,
            ),
            metrics_port: parse_or(lookup("METRICS_PORT"), defaults.metrics_port, |v| {
                v.parse().ok()
            }),
            server_startup_timeout_secs: parse_or(
                lookup("SERVER_STARTUP_TIMEOUT_SECS"),
                defaults.server_startup_timeout_secs,
                |v| v.parse().ok(),
            ),
            server_poll_interval_ms: parse_or(
                lookup("SERVER_POLL_INTERVAL_MS"),
                defaults.server_poll_interval_ms,
                |v| v.parse().ok(),
            ),
            backoff_min_secs: parse_or(lookup("BACKOFF_MIN_SECS"), defaults.backoff_min_secs, |v| {
                v.parse().ok()
            }),
            backoff_max_secs: parse_or(lookup("BACKOFF_MAX_SECS"), defaults.backoff_max_secs, |v| {
                v.parse().ok()
            }),
            reconcile_timeout_secs: parse_or(
                lookup("RECONCILE_TIMEOUT_SECS"),
                defaults.reconcile_timeout_secs,
                |v| v.parse().ok(),
            ),
            watch_restart_delay_secs: parse_or(
                lookup("WATCH_RESTART_DELAY_SECS"),
                defaults.watch_restart_delay_secs,
                |v| v.parse().ok(),
            ),
            max_concurrent_reconciliations: parse_or(
                lookup("MAX_CONCURRENT_RECONCILIATIONS"),
                defaults.max_concurrent_reconciliations,
                |v| v.parse().ok(),
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT").unwrap_or(defaults.log_format),
        }
    }

    /// Fill in the cluster resource namespace from the service account mount when unset
    pub fn resolve_cluster_resource_namespace(&mut self) -> Result<&str, ConfigError> {
        if self.cluster_resource_namespace.is_empty() {
            self.cluster_resource_namespace =
                read_in_cluster_namespace(Path::new(IN_CLUSTER_NAMESPACE_PATH))?;
        }
        Ok(&self.cluster_resource_namespace)
    }

    /// Per-reconciliation deadline
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Whether the JSON log formatter was requested
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Read the namespace the pod runs in from its service account mount
pub fn read_in_cluster_namespace(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotInCluster);
    }
    let namespace = std::fs::read_to_string(path).map_err(|source| ConfigError::NamespaceFile {
        path: path.display().to_string(),
        source,
    })?;
    Ok(namespace.trim().to_string())
}

fn parse_or<T>(raw: Option<String>, default: T, parse: impl Fn(&str) -> Option<T>) -> T {
    raw.as_deref().and_then(|v| parse(v.trim())).unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
