//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `reloader_reloaded_total` - Total number of reload attempts, labeled by success
//! - `reloader_reloaded_by_namespace_total` - Reload attempts labeled by success and namespace
//! - `reloader_watch_errors_total` - Watch stream errors, labeled by watched resource kind

use anyhow::Result;
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RELOADED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("reloaded_total", "Total number of reload attempts").namespace("reloader"),
        &["success"],
    )
    .expect("Failed to create RELOADED_TOTAL metric - this should never happen")
});

static RELOADED_BY_NAMESPACE_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reloaded_by_namespace_total",
            "Total number of reload attempts per namespace",
        )
        .namespace("reloader"),
        &["success", "namespace"],
    )
    .expect("Failed to create RELOADED_BY_NAMESPACE_TOTAL metric - this should never happen")
});

static WATCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("watch_errors_total", "Total number of watch stream errors")
            .namespace("reloader"),
        &["resource"],
    )
    .expect("Failed to create WATCH_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the crate registry. Called once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RELOADED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RELOADED_BY_NAMESPACE_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_ERRORS_TOTAL.clone()))?;
    Ok(())
}

/// Record the outcome of one reload attempt.
pub fn record_reload(namespace: &str, success: bool) {
    let success = if success { "true" } else { "false" };
    RELOADED_TOTAL.with_label_values(&[success]).inc();
    RELOADED_BY_NAMESPACE_TOTAL
        .with_label_values(&[success, namespace])
        .inc();
}

pub fn record_watch_error(resource: &str) {
    WATCH_ERRORS_TOTAL.with_label_values(&[resource]).inc();
}
