//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ticks**: Count and duration of price engine ticks
//! - **Updates**: Price updates delivered and sends that failed
//! - **Connections**: WebSocket client and subscription counts
//! - **Control**: Inbound control messages and parse rejections
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Tick metrics
    describe_counter!(
        "live_data_ticks_total",
        "Total price engine ticks completed"
    );
    describe_histogram!(
        "live_data_tick_duration_seconds",
        "Time to compute one tick across all symbols"
    );

    // Delivery counters
    describe_counter!(
        "live_data_updates_sent_total",
        "Total price updates delivered to clients"
    );
    describe_counter!(
        "live_data_send_failures_total",
        "Total fan-out sends dropped due to dead or stalled clients"
    );

    // Connection gauges
    describe_gauge!(
        "live_data_client_connections",
        "Number of open WebSocket client connections"
    );
    describe_gauge!(
        "live_data_subscribed_symbols",
        "Subscription entries across all connections"
    );

    // Control-protocol counters
    describe_counter!(
        "live_data_control_messages_total",
        "Total control messages received from clients"
    );
    describe_counter!(
        "live_data_parse_errors_total",
        "Total control messages rejected as malformed"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one completed engine tick and its duration.
pub fn record_tick(duration: Duration) {
    counter!("live_data_ticks_total").increment(1);
    histogram!("live_data_tick_duration_seconds").record(duration.as_secs_f64());
}

/// Record price updates delivered to a client.
pub fn record_updates_sent(count: u64) {
    counter!("live_data_updates_sent_total").increment(count);
}

/// Record a fan-out send that dropped a client.
pub fn record_send_failure() {
    counter!("live_data_send_failures_total").increment(1);
}

/// Update the open client connection count.
pub fn set_client_connections(count: f64) {
    gauge!("live_data_client_connections").set(count);
}

/// Update the total subscription entry count.
pub fn set_subscribed_symbols(count: f64) {
    gauge!("live_data_subscribed_symbols").set(count);
}

/// Record an inbound control message.
pub fn record_control_message() {
    counter!("live_data_control_messages_total").increment(1);
}

/// Record a control message rejected as malformed.
pub fn record_parse_error() {
    counter!("live_data_parse_errors_total").increment(1);
}
