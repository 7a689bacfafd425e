//! # Metrics
//!
//! Prometheus metrics for monitoring the issuer.
//!
//! ## Metrics Exposed
//!
//! - `keyvault_issuer_reconciliations_total{controller, outcome}` - Finished reconciliations
//! - `keyvault_issuer_reconciliation_errors_total{controller, error}` - Reconciliations that will be retried
//! - `keyvault_issuer_reconciliation_duration_seconds{controller}` - Duration of reconciliations
//! - `keyvault_issuer_keyvault_operations_total{operation}` - Key Vault REST operations
//! - `keyvault_issuer_keyvault_operation_duration_seconds{operation}` - Duration of Key Vault operations
//! - `keyvault_issuer_keyvault_operation_errors_total{operation}` - Failed Key Vault operations
//! - `keyvault_issuer_certificates_issued_total` - Certificates returned by Key Vault
//! - `keyvault_issuer_requeues_total{reason}` - Requeues scheduled by the error policy

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_issuer_reconciliations_total",
            "Total number of reconciliations by controller and outcome",
        ),
        &["controller", "outcome"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_issuer_reconciliation_errors_total",
            "Total number of reconciliation errors by controller and error kind",
        ),
        &["controller", "error"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "keyvault_issuer_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static KEYVAULT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_issuer_keyvault_operations_total",
            "Total number of Key Vault operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create KEYVAULT_OPERATIONS_TOTAL metric - this should never happen")
});

static KEYVAULT_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "keyvault_issuer_keyvault_operation_duration_seconds",
            "Duration of Key Vault operations in seconds by operation",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create KEYVAULT_OPERATION_DURATION metric - this should never happen")
});

static KEYVAULT_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_issuer_keyvault_operation_errors_total",
            "Total number of Key Vault operation errors by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create KEYVAULT_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static CERTIFICATES_ISSUED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_issuer_certificates_issued_total",
        "Total number of certificates issued through Key Vault",
    )
    .expect("Failed to create CERTIFICATES_ISSUED_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_issuer_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(KEYVAULT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEYVAULT_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(KEYVAULT_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATES_ISSUED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(controller: &str, outcome: &str) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[controller, outcome])
        .inc();
}

pub fn increment_reconciliation_errors(controller: &str, error: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[controller, error])
        .inc();
}

pub fn observe_reconciliation_duration(controller: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[controller])
        .observe(duration);
}

pub fn record_keyvault_operation(operation: &str, duration: f64) {
    KEYVAULT_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
    KEYVAULT_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_keyvault_operation_errors(operation: &str) {
    KEYVAULT_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_certificates_issued() {
    CERTIFICATES_ISSUED_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
