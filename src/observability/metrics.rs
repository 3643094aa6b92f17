//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define guard metrics (admissions, transitions, cancellations, usage)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `guard_requests_total` (counter): admission decisions by outcome
//! - `guard_transitions_total` (counter): state changes by kind
//! - `guard_cancelled_requests_total` (counter): in-flight requests aborted
//! - `guard_overload_responses_total` (counter): 429 responses seen
//! - `guard_window_usage_percent` (gauge): share of the server ceiling used
//! - `guard_queue_depth` (gauge): requests waiting in the sequencer
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter listening on `addr`. Needs a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(outcome: &'static str) {
    counter!("guard_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_transition(kind: &'static str) {
    counter!("guard_transitions_total", "kind" => kind).increment(1);
}

pub fn record_cancelled(count: usize) {
    counter!("guard_cancelled_requests_total").increment(count as u64);
}

pub fn record_overload() {
    counter!("guard_overload_responses_total").increment(1);
}

pub fn record_window_usage(percent: f64) {
    gauge!("guard_window_usage_percent").set(percent);
}

pub fn record_queue_depth(depth: usize) {
    gauge!("guard_queue_depth").set(depth as f64);
}

pub fn record_listener_panic() {
    counter!("guard_listener_panics_total").increment(1);
}
