//! In-memory reference implementation of the activity store.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Mutex;

use dashmap::DashMap;
use uuid::Uuid;

use crate::anomaly::AnomalyDetection;
use crate::persist::{ActivityStore, BlacklistEntry, SessionRecord};
use crate::pipeline::incident::{IncidentStatus, SecurityIncident};
use crate::signature::IntrusionAttempt;
use crate::store::{epoch_secs, StoreError};

/// DashMap/Mutex-backed activity store with optional JSON persistence for
/// the blacklist, so known-bad IPs survive a restart.
#[derive(Default)]
pub struct MemoryActivityStore {
    intrusions: Mutex<Vec<IntrusionAttempt>>,
    anomalies: Mutex<Vec<AnomalyDetection>>,
    sessions: Mutex<Vec<SessionRecord>>,
    incidents: DashMap<Uuid, SecurityIncident>,
    blacklist: DashMap<IpAddr, BlacklistEntry>,
    persistence_path: Option<String>,
}

impl MemoryActivityStore {
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            persistence_path,
            ..Self::default()
        }
    }

    /// Load the blacklist from file if it exists.
    pub fn load_from_file(path: &str) -> std::io::Result<Self> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            let entries: HashMap<IpAddr, BlacklistEntry> = serde_json::from_reader(reader)?;
            let count = entries.len();
            for (ip, entry) in entries {
                store.blacklist.insert(ip, entry);
            }
            tracing::info!(count, path, "Loaded blacklist from file");
        }
        Ok(store)
    }

    /// Save the blacklist to the configured file.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        if let Some(path) = &self.persistence_path {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            let entries: HashMap<IpAddr, BlacklistEntry> = self
                .blacklist
                .iter()
                .map(|r| (*r.key(), r.value().clone()))
                .collect();
            serde_json::to_writer(writer, &entries)?;
            tracing::info!(count = entries.len(), "Saved blacklist to file");
        }
        Ok(())
    }

    pub fn intrusion_count(&self) -> usize {
        self.intrusions.lock().expect("intrusion log mutex poisoned").len()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.lock().expect("anomaly log mutex poisoned").len()
    }
}

impl ActivityStore for MemoryActivityStore {
    fn record_intrusion(&self, attempt: IntrusionAttempt) -> Result<(), StoreError> {
        self.intrusions
            .lock()
            .expect("intrusion log mutex poisoned")
            .push(attempt);
        Ok(())
    }

    fn record_anomaly(&self, detection: AnomalyDetection) -> Result<(), StoreError> {
        self.anomalies
            .lock()
            .expect("anomaly log mutex poisoned")
            .push(detection);
        Ok(())
    }

    fn record_incident(&self, incident: SecurityIncident) -> Result<(), StoreError> {
        self.incidents.insert(incident.id, incident);
        Ok(())
    }

    fn record_session(&self, session: SessionRecord) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .expect("session log mutex poisoned")
            .push(session);
        Ok(())
    }

    fn update_incident_status(&self, id: Uuid, status: IncidentStatus) -> Result<bool, StoreError> {
        match self.incidents.get_mut(&id) {
            Some(mut incident) => {
                incident.transition(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn incidents(&self) -> Result<Vec<SecurityIncident>, StoreError> {
        let mut all: Vec<SecurityIncident> =
            self.incidents.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    fn sessions_since(&self, cutoff: u64) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .expect("session log mutex poisoned")
            .iter()
            .filter(|s| s.occurred_at >= cutoff)
            .cloned()
            .collect())
    }

    fn is_blacklisted(&self, ip: IpAddr) -> Result<bool, StoreError> {
        Ok(self.blacklist.contains_key(&ip))
    }

    fn add_blacklist(&self, ip: IpAddr, reason: &str) -> Result<(), StoreError> {
        self.blacklist.insert(
            ip,
            BlacklistEntry {
                ip,
                reason: reason.to_string(),
                created_at: epoch_secs(),
            },
        );
        if let Err(e) = self.save_to_file() {
            tracing::warn!(error = %e, "Failed to persist blacklist");
        }
        Ok(())
    }

    fn remove_blacklist(&self, ip: IpAddr) -> Result<(), StoreError> {
        self.blacklist.remove(&ip);
        if let Err(e) = self.save_to_file() {
            tracing::warn!(error = %e, "Failed to persist blacklist");
        }
        Ok(())
    }

    fn blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        Ok(self.blacklist.iter().map(|r| r.value().clone()).collect())
    }

    fn purge_before(&self, cutoff: u64) -> Result<u64, StoreError> {
        let mut purged = 0u64;
        {
            let mut intrusions = self.intrusions.lock().expect("intrusion log mutex poisoned");
            let before = intrusions.len();
            intrusions.retain(|r| r.occurred_at >= cutoff);
            purged += (before - intrusions.len()) as u64;
        }
        {
            let mut anomalies = self.anomalies.lock().expect("anomaly log mutex poisoned");
            let before = anomalies.len();
            anomalies.retain(|r| r.detected_at >= cutoff);
            purged += (before - anomalies.len()) as u64;
        }
        {
            let mut sessions = self.sessions.lock().expect("session log mutex poisoned");
            let before = sessions.len();
            sessions.retain(|r| r.occurred_at >= cutoff);
            purged += (before - sessions.len()) as u64;
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::incident::IncidentKind;
    use crate::signature::Severity;

    fn ip() -> IpAddr {
        "203.0.113.7".parse().unwrap()
    }

    #[test]
    fn test_blacklist_roundtrip() {
        let store = MemoryActivityStore::new(None);
        assert!(!store.is_blacklisted(ip()).unwrap());

        store.add_blacklist(ip(), "manual").unwrap();
        assert!(store.is_blacklisted(ip()).unwrap());
        assert_eq!(store.blacklist_entries().unwrap().len(), 1);

        store.remove_blacklist(ip()).unwrap();
        assert!(!store.is_blacklisted(ip()).unwrap());
    }

    #[test]
    fn test_blacklist_persistence() {
        let path = "test_blacklist_persistence.json";

        let store = MemoryActivityStore::new(Some(path.to_string()));
        store.add_blacklist(ip(), "scripted abuse").unwrap();

        let loaded = MemoryActivityStore::load_from_file(path).unwrap();
        assert!(loaded.is_blacklisted(ip()).unwrap());

        std::fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_incident_status_transition() {
        let store = MemoryActivityStore::new(None);
        let incident = SecurityIncident::new(
            IncidentKind::IntrusionAttempt,
            Severity::Critical,
            "sql injection from 203.0.113.7",
            vec![ip().to_string()],
        );
        let id = incident.id;
        store.record_incident(incident).unwrap();

        assert!(store
            .update_incident_status(id, IncidentStatus::Resolved)
            .unwrap());
        let listed = store.incidents().unwrap();
        assert_eq!(listed[0].status, IncidentStatus::Resolved);
        assert!(listed[0].resolved_at.is_some());

        assert!(!store
            .update_incident_status(Uuid::new_v4(), IncidentStatus::Resolved)
            .unwrap());
    }

    #[test]
    fn test_purge_before() {
        let store = MemoryActivityStore::new(None);
        let now = epoch_secs();
        for age in [10u64, 100_000] {
            store
                .record_session(SessionRecord {
                    account_id: "acct".to_string(),
                    source_ip: ip(),
                    user_agent: None,
                    occurred_at: now - age,
                })
                .unwrap();
        }

        let purged = store.purge_before(now - 1000).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.sessions_since(0).unwrap().len(), 1);
    }
}
