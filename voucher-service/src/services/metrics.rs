//! Metrics collection and Prometheus export.
//!
//! Installs the Prometheus recorder, renders the /metrics payload and holds
//! the domain counters recorded by the voucher and allocation services.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Panics if called more than once.
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

/// Count an allocation change by operation (`link`, `update`, `unlink`) and outcome.
pub fn record_allocation(operation: &'static str, outcome: &'static str) {
    metrics::counter!(
        "voucher_allocations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_voucher_created(voucher_type: &'static str) {
    metrics::counter!("vouchers_created_total", "voucher_type" => voucher_type).increment(1);
}

pub fn record_quotation_created(kind: &'static str) {
    metrics::counter!("quotations_created_total", "kind" => kind).increment(1);
}

/// Count identifier collisions that forced another attempt.
pub fn record_id_collision(entity: &'static str) {
    metrics::counter!("identifier_collisions_total", "entity" => entity).increment(1);
}
