//! # Logging
//!
//! `tracing-subscriber` setup. `RUST_LOG` wins over the configured level when set.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "azure_keyvault_issuer=info";

/// Build the filter for the configured log level.
///
/// A bare level (`DEBUG`) applies to this crate only, so kube and hyper stay
/// quiet; anything else is treated as a full `EnvFilter` directive.
pub fn env_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = log_level.trim();
    let directive = match level.to_ascii_lowercase().as_str() {
        "" => DEFAULT_DIRECTIVE.to_string(),
        lvl @ ("error" | "warn" | "info" | "debug" | "trace") => {
            format!("azure_keyvault_issuer={lvl}")
        }
        _ => level.to_string(),
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber
///
/// Returns an error when a subscriber is already installed.
pub fn init_logging(log_level: &str, json: bool) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(log_level));
    let result = if json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
