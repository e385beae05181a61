//! Per-account behavior profiles.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::store::epoch_secs;

/// Rolling baseline of an account's expected behavior.
///
/// Recomputed by the periodic batch job; consulted read-only during live
/// scoring. Replacement is whole-record: readers hold an `Arc` snapshot
/// and never observe a partially-updated profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub account_id: String,
    pub known_ips: HashSet<IpAddr>,
    pub known_user_agents: HashSet<String>,
    /// Mean gap between recent sessions, when there are enough to tell.
    pub typical_request_interval_ms: Option<u64>,
    pub last_updated: u64,
}

impl BehaviorProfile {
    /// Initial profile from the account's first successful authentication.
    pub fn seed(account_id: &str, ip: IpAddr, user_agent: Option<&str>) -> Self {
        Self {
            account_id: account_id.to_string(),
            known_ips: HashSet::from([ip]),
            known_user_agents: user_agent.map(str::to_string).into_iter().collect(),
            typical_request_interval_ms: None,
            last_updated: epoch_secs(),
        }
    }
}

/// Concurrent profile map with atomic whole-record replacement.
#[derive(Default)]
pub struct ProfileStore {
    profiles: DashMap<String, Arc<BehaviorProfile>>,
    /// Last successful session per account (epoch seconds), for the
    /// rapid-session signal.
    last_session: DashMap<String, u64>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account_id: &str) -> Option<Arc<BehaviorProfile>> {
        self.profiles.get(account_id).map(|r| r.value().clone())
    }

    /// Atomically replace an account's profile.
    pub fn replace(&self, profile: BehaviorProfile) {
        self.profiles
            .insert(profile.account_id.clone(), Arc::new(profile));
    }

    /// Create a profile lazily on first successful authentication.
    pub fn seed_if_missing(&self, account_id: &str, ip: IpAddr, user_agent: Option<&str>) {
        self.profiles
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(BehaviorProfile::seed(account_id, ip, user_agent)));
    }

    pub fn note_session(&self, account_id: &str, at: u64) {
        self.last_session.insert(account_id.to_string(), at);
    }

    pub fn last_session(&self, account_id: &str) -> Option<u64> {
        self.last_session.get(account_id).map(|r| *r.value())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_only_creates_once() {
        let store = ProfileStore::new();
        let ip1: IpAddr = "192.0.2.1".parse().unwrap();
        let ip2: IpAddr = "192.0.2.2".parse().unwrap();

        store.seed_if_missing("acct", ip1, Some("ua-1"));
        store.seed_if_missing("acct", ip2, Some("ua-2"));

        let profile = store.get("acct").unwrap();
        assert!(profile.known_ips.contains(&ip1));
        assert!(!profile.known_ips.contains(&ip2));
    }

    #[test]
    fn test_replace_swaps_snapshot() {
        let store = ProfileStore::new();
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        store.seed_if_missing("acct", ip, None);

        let old = store.get("acct").unwrap();

        let mut rebuilt = BehaviorProfile::seed("acct", ip, Some("ua-new"));
        rebuilt.known_ips.insert("192.0.2.9".parse().unwrap());
        store.replace(rebuilt);

        // The old snapshot is unchanged; new reads see the replacement.
        assert_eq!(old.known_user_agents.len(), 0);
        let new = store.get("acct").unwrap();
        assert!(new.known_user_agents.contains("ua-new"));
        assert_eq!(new.known_ips.len(), 2);
    }
}
