//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vigil_evaluations_total` (counter): evaluations by verdict
//! - `vigil_detections_total` (counter): signature matches by family
//! - `vigil_blocks_total` (counter): applied blocks by reason
//! - `vigil_incidents_total` (counter): incidents raised by severity
//! - `vigil_auth_events_total` (counter): reported auth events by outcome
//! - `vigil_audit_events_total` (counter): audit events by action
//! - `vigil_store_errors_total` (counter): backing-store failures by op
//! - `vigil_emergency_mode` (gauge): 1 while emergency mode is active

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

pub fn record_evaluation(verdict: &'static str) {
    counter!("vigil_evaluations_total", "verdict" => verdict).increment(1);
}

pub fn record_detection(family: &'static str) {
    counter!("vigil_detections_total", "family" => family).increment(1);
}

pub fn record_block(reason: &str) {
    counter!("vigil_blocks_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_incident(severity: &'static str) {
    counter!("vigil_incidents_total", "severity" => severity).increment(1);
}

pub fn record_auth_event(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("vigil_auth_events_total", "outcome" => outcome).increment(1);
}

pub fn record_audit(action: &'static str) {
    counter!("vigil_audit_events_total", "action" => action).increment(1);
}

pub fn record_store_error(op: &'static str) {
    counter!("vigil_store_errors_total", "op" => op).increment(1);
}

pub fn set_emergency(active: bool) {
    gauge!("vigil_emergency_mode").set(if active { 1.0 } else { 0.0 });
}
