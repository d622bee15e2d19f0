//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by outcome
//! - `relay_forwarded_bytes_total` (counter): bytes sent to clients, by channel
//! - `relay_suppressed_chunks_total` (counter): stderr chunks held back by the filter
//! - `relay_child_duration_seconds` (histogram): summarizer wall-clock time
//! - `relay_active_children` (gauge): summarizers currently running
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// A request that ended before any child was spawned.
pub fn record_rejected(outcome: &'static str) {
    counter!("relay_requests_total", "outcome" => outcome).increment(1);
}

pub fn child_started() {
    gauge!("relay_active_children").increment(1.0);
}

pub fn child_finished(outcome: &'static str, elapsed: Duration) {
    gauge!("relay_active_children").decrement(1.0);
    counter!("relay_requests_total", "outcome" => outcome).increment(1);
    histogram!("relay_child_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_forwarded(channel: &'static str, bytes: usize) {
    counter!("relay_forwarded_bytes_total", "channel" => channel).increment(bytes as u64);
}

pub fn record_suppressed_chunk() {
    counter!("relay_suppressed_chunks_total").increment(1);
}
