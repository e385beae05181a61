//! Persistence contracts for detection records.
//!
//! The relational schema itself is out of scope; the engine sees it only
//! through `ActivityStore`: append-only writes for detection records,
//! narrow reads for recent-activity aggregates and the permanent
//! blacklist. `memory.rs` is the reference implementation; `retry.rs`
//! drains failed writes off the request path.

pub mod memory;
pub mod retry;

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anomaly::AnomalyDetection;
use crate::pipeline::incident::{IncidentStatus, SecurityIncident};
use crate::signature::IntrusionAttempt;
use crate::store::StoreError;

/// One successful authentication/session event, the raw material for
/// behavior profile recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub account_id: String,
    pub source_ip: IpAddr,
    pub user_agent: Option<String>,
    /// Seconds since the Unix epoch.
    pub occurred_at: u64,
}

/// A permanent blacklist entry. Removed only by explicit operator action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub ip: IpAddr,
    pub reason: String,
    pub created_at: u64,
}

/// Durable store for detection records and the permanent blacklist.
///
/// Record writes are append-only; incidents are the one record type with
/// a mutable field (status), and only the admin surface transitions it.
pub trait ActivityStore: Send + Sync {
    fn record_intrusion(&self, attempt: IntrusionAttempt) -> Result<(), StoreError>;
    fn record_anomaly(&self, detection: AnomalyDetection) -> Result<(), StoreError>;
    fn record_incident(&self, incident: SecurityIncident) -> Result<(), StoreError>;
    fn record_session(&self, session: SessionRecord) -> Result<(), StoreError>;

    /// Transition an incident's status. Returns false for unknown ids.
    fn update_incident_status(&self, id: Uuid, status: IncidentStatus) -> Result<bool, StoreError>;

    fn incidents(&self) -> Result<Vec<SecurityIncident>, StoreError>;

    /// Successful sessions at or after `cutoff` (epoch seconds).
    fn sessions_since(&self, cutoff: u64) -> Result<Vec<SessionRecord>, StoreError>;

    fn is_blacklisted(&self, ip: IpAddr) -> Result<bool, StoreError>;
    fn add_blacklist(&self, ip: IpAddr, reason: &str) -> Result<(), StoreError>;
    fn remove_blacklist(&self, ip: IpAddr) -> Result<(), StoreError>;
    fn blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StoreError>;

    /// Drop intrusion, anomaly, and session records older than `cutoff`.
    /// Returns the number of records removed.
    fn purge_before(&self, cutoff: u64) -> Result<u64, StoreError>;
}
