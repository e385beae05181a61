//! Security incidents raised by the decision pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signature::Severity;
use crate::store::epoch_secs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    IntrusionAttempt,
    HighThreatScore,
    RateAbuse,
    BehaviorAnomaly,
}

/// Lifecycle state; transitioned only by operator action, never by
/// detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityIncident {
    pub id: Uuid,
    pub kind: IncidentKind,
    pub severity: Severity,
    pub description: String,
    /// Source IPs and/or account ids involved.
    pub affected: Vec<String>,
    pub status: IncidentStatus,
    pub created_at: u64,
    pub resolved_at: Option<u64>,
}

impl SecurityIncident {
    pub fn new(
        kind: IncidentKind,
        severity: Severity,
        description: impl Into<String>,
        affected: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            description: description.into(),
            affected,
            status: IncidentStatus::Open,
            created_at: epoch_secs(),
            resolved_at: None,
        }
    }

    /// Apply a status transition, stamping the resolution time when the
    /// incident leaves the active states.
    pub fn transition(&mut self, status: IncidentStatus) {
        self.status = status;
        self.resolved_at = match status {
            IncidentStatus::Resolved | IncidentStatus::Ignored => Some(epoch_secs()),
            IncidentStatus::Open | IncidentStatus::Investigating => None,
        };
    }
}
