//! Metrics collection and exposition.
//!
//! # Metrics
//! - `log_stream_published_total` (counter): records acknowledged by the broker, by application
//! - `log_stream_delivery_failures_total` (counter): records dropped after the retry budget, by application
//! - `log_stream_rendered_total` (counter): records rendered, by partition
//! - `log_stream_malformed_total` (counter): records skipped as malformed
//! - `log_stream_session_rejoins_total` (counter): consumer-group rejoins
//!
//! Without an installed recorder the macros are no-ops.

use std::net::SocketAddr;

use ::metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener. Must run inside a
/// Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_published(application: &str) {
    counter!("log_stream_published_total", "application" => application.to_string()).increment(1);
}

pub fn record_delivery_failure(application: &str) {
    counter!("log_stream_delivery_failures_total", "application" => application.to_string())
        .increment(1);
}

pub fn record_rendered(partition: i32) {
    counter!("log_stream_rendered_total", "partition" => partition.to_string()).increment(1);
}

pub fn record_malformed() {
    counter!("log_stream_malformed_total").increment(1);
}

pub fn record_rejoin() {
    counter!("log_stream_session_rejoins_total").increment(1);
}
