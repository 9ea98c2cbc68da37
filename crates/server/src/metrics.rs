//! Prometheus metrics

use metrics::{counter, describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and register metric descriptions.
/// Safe to call more than once; later calls are no-ops.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle);
    }

    let handle = PrometheusBuilder::new().install_recorder().ok()?;

    describe_counter!("sofia_calls_total", "Inbound calls answered");
    describe_counter!("sofia_turns_total", "Conversational turns processed");
    describe_counter!("sofia_reservations_total", "Reservations committed");
    describe_counter!("sofia_orders_total", "Takeout orders committed");
    describe_counter!("sofia_barge_ins_total", "Caller barge-ins during AI speech");
    describe_counter!(
        "sofia_dropped_frames_total",
        "Outbound frames dropped after barge-in truncation"
    );
    describe_counter!(
        "sofia_malformed_payloads_total",
        "Inbound media frames dropped as undecodable"
    );

    let _ = HANDLE.set(handle);
    HANDLE.get()
}

/// Record an answered call
pub fn record_call() {
    counter!("sofia_calls_total").increment(1);
}

/// Record a processed turn
pub fn record_turn() {
    counter!("sofia_turns_total").increment(1);
}

/// Record active session count
pub fn record_active_sessions(count: usize) {
    gauge!("sofia_active_sessions").set(count as f64);
}

/// Render the metrics exposition for the `/metrics` endpoint
pub async fn metrics_handler() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}
