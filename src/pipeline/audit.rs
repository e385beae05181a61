//! Audit event sink.
//!
//! Every blocking decision and detected attack is forwarded as a
//! structured event for downstream alerting. Emission is fire-and-forget:
//! the engine never depends on the sink's success.

use std::net::IpAddr;

use serde::Serialize;

use crate::observability::metrics;
use crate::store::epoch_secs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RequestBlocked,
    ChallengeIssued,
    IpBlocked,
    IpBlacklisted,
    IntrusionDetected,
    AnomalyDetected,
    IncidentRaised,
    AuthFailureRecorded,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RequestBlocked => "request_blocked",
            AuditAction::ChallengeIssued => "challenge_issued",
            AuditAction::IpBlocked => "ip_blocked",
            AuditAction::IpBlacklisted => "ip_blacklisted",
            AuditAction::IntrusionDetected => "intrusion_detected",
            AuditAction::AnomalyDetected => "anomaly_detected",
            AuditAction::IncidentRaised => "incident_raised",
            AuditAction::AuthFailureRecorded => "auth_failure_recorded",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub source_ip: IpAddr,
    pub account_id: Option<String>,
    pub reason: String,
    pub occurred_at: u64,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        source_ip: IpAddr,
        account_id: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            action,
            source_ip,
            account_id,
            reason: reason.into(),
            occurred_at: epoch_secs(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Default sink: structured log line plus a metrics counter.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            target: "vigil::audit",
            action = event.action.as_str(),
            ip = %event.source_ip,
            account = event.account_id.as_deref().unwrap_or("-"),
            reason = %event.reason,
            "audit"
        );
        metrics::record_audit(event.action.as_str());
    }
}
