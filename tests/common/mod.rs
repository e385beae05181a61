//! Shared fixtures for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::net::TcpListener;

use vigil::config::{ConfigHandle, EngineConfig};
use vigil::http::EngineServer;
use vigil::persist::memory::MemoryActivityStore;
use vigil::persist::{ActivityStore, BlacklistEntry, SessionRecord};
use vigil::pipeline::{ThreatEngine, TracingAuditSink};
use vigil::signature::{IntrusionAttempt, PatternSet};
use vigil::store::memory::MemoryStore;
use vigil::store::{SharedStore, StoreError};

#[allow(dead_code)]
pub struct EngineFixture {
    pub engine: Arc<ThreatEngine>,
    pub shared: Arc<MemoryStore>,
    pub activity: Arc<MemoryActivityStore>,
    pub config: ConfigHandle,
}

/// Engine wired to in-memory stores, with config tweaks applied.
#[allow(dead_code)]
pub fn build_engine(mutate: impl FnOnce(&mut EngineConfig)) -> EngineFixture {
    let mut config = EngineConfig::default();
    mutate(&mut config);
    let handle: ConfigHandle = Arc::new(ArcSwap::from_pointee(config));
    let patterns = Arc::new(ArcSwap::from_pointee(PatternSet::builtin()));
    let shared = Arc::new(MemoryStore::new());
    let activity = Arc::new(MemoryActivityStore::new(None));
    let (engine, _retry_rx) = ThreatEngine::new(
        handle.clone(),
        patterns,
        shared.clone(),
        activity.clone(),
        Arc::new(TracingAuditSink),
    );
    EngineFixture {
        engine: Arc::new(engine),
        shared,
        activity,
        config: handle,
    }
}

/// Engine over caller-supplied stores (for failure injection).
#[allow(dead_code)]
pub fn build_engine_with(
    shared: Arc<dyn SharedStore>,
    activity: Arc<dyn ActivityStore>,
    mutate: impl FnOnce(&mut EngineConfig),
) -> (Arc<ThreatEngine>, ConfigHandle) {
    let mut config = EngineConfig::default();
    mutate(&mut config);
    let handle: ConfigHandle = Arc::new(ArcSwap::from_pointee(config));
    let patterns = Arc::new(ArcSwap::from_pointee(PatternSet::builtin()));
    let (engine, _retry_rx) = ThreatEngine::new(
        handle.clone(),
        patterns,
        shared,
        activity,
        Arc::new(TracingAuditSink),
    );
    (Arc::new(engine), handle)
}

/// Spawn the decision service on an ephemeral port.
#[allow(dead_code)]
pub async fn spawn_server(mutate: impl FnOnce(&mut EngineConfig)) -> (SocketAddr, EngineFixture) {
    let fixture = build_engine(mutate);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = EngineServer::new(fixture.config.clone(), fixture.engine.clone());
    tokio::spawn(server.run(listener));
    // Give the acceptor a moment.
    tokio::time::sleep(Duration::from_millis(20)).await;
    (addr, fixture)
}

/// Shared store that always errors, simulating an unreachable counter
/// service.
#[allow(dead_code)]
pub struct DownSharedStore;

impl SharedStore for DownSharedStore {
    fn increment(&self, _key: &str, _window: Duration) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }
    fn counter(&self, _key: &str) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }
    fn reset(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }
    fn put(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }
    fn fetch(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }
    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }
    fn scan_prefix(&self, _prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }
}

/// Activity store whose blacklist reads fail while everything else works.
#[allow(dead_code)]
pub struct BlacklistDownStore {
    pub inner: MemoryActivityStore,
}

#[allow(dead_code)]
impl BlacklistDownStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryActivityStore::new(None),
        }
    }
}

impl ActivityStore for BlacklistDownStore {
    fn record_intrusion(&self, a: IntrusionAttempt) -> Result<(), StoreError> {
        self.inner.record_intrusion(a)
    }
    fn record_anomaly(&self, d: vigil::anomaly::AnomalyDetection) -> Result<(), StoreError> {
        self.inner.record_anomaly(d)
    }
    fn record_incident(&self, i: vigil::pipeline::SecurityIncident) -> Result<(), StoreError> {
        self.inner.record_incident(i)
    }
    fn record_session(&self, s: SessionRecord) -> Result<(), StoreError> {
        self.inner.record_session(s)
    }
    fn update_incident_status(
        &self,
        id: uuid::Uuid,
        status: vigil::pipeline::IncidentStatus,
    ) -> Result<bool, StoreError> {
        self.inner.update_incident_status(id, status)
    }
    fn incidents(&self) -> Result<Vec<vigil::pipeline::SecurityIncident>, StoreError> {
        self.inner.incidents()
    }
    fn sessions_since(&self, cutoff: u64) -> Result<Vec<SessionRecord>, StoreError> {
        self.inner.sessions_since(cutoff)
    }
    fn is_blacklisted(&self, _ip: std::net::IpAddr) -> Result<bool, StoreError> {
        Err(StoreError::Timeout(Duration::from_millis(50)))
    }
    fn add_blacklist(&self, ip: std::net::IpAddr, reason: &str) -> Result<(), StoreError> {
        self.inner.add_blacklist(ip, reason)
    }
    fn remove_blacklist(&self, ip: std::net::IpAddr) -> Result<(), StoreError> {
        self.inner.remove_blacklist(ip)
    }
    fn blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        self.inner.blacklist_entries()
    }
    fn purge_before(&self, cutoff: u64) -> Result<u64, StoreError> {
        self.inner.purge_before(cutoff)
    }
}
