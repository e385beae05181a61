//! Periodic behavior-profile recomputation.
//!
//! Runs fully off the request path. Each cycle rebuilds profiles from
//! recent successful-session history and swaps them in whole, then applies
//! the retention purge to aged-out detection records.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;

use crate::anomaly::profile::{BehaviorProfile, ProfileStore};
use crate::config::ConfigHandle;
use crate::persist::{ActivityStore, SessionRecord};
use crate::store::{epoch_secs, StoreError};

pub struct ProfileRefresher {
    profiles: Arc<ProfileStore>,
    activity: Arc<dyn ActivityStore>,
    config: ConfigHandle,
}

impl ProfileRefresher {
    pub fn new(
        profiles: Arc<ProfileStore>,
        activity: Arc<dyn ActivityStore>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            profiles,
            activity,
            config,
        }
    }

    /// Run the recompute loop until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let interval = self.config.load().anomaly.refresh_interval_secs;
            tokio::select! {
                _ = sleep(Duration::from_secs(interval)) => {
                    match self.refresh_once() {
                        Ok(updated) => {
                            tracing::debug!(updated, "Behavior profiles recomputed");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Profile recompute failed, keeping stale profiles");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Profile refresher stopping");
                    break;
                }
            }
        }
    }

    /// One recompute cycle. Returns the number of profiles replaced.
    pub fn refresh_once(&self) -> Result<usize, StoreError> {
        let cfg = self.config.load();
        let history_cutoff =
            epoch_secs().saturating_sub(cfg.anomaly.history_window_days * 86_400);
        let sessions = self.activity.sessions_since(history_cutoff)?;

        let mut by_account: HashMap<String, Vec<&SessionRecord>> = HashMap::new();
        for session in &sessions {
            by_account
                .entry(session.account_id.clone())
                .or_default()
                .push(session);
        }

        let updated = by_account.len();
        for (account_id, mut sessions) in by_account {
            sessions.sort_by_key(|s| s.occurred_at);
            self.profiles.replace(build_profile(&account_id, &sessions));
        }

        // Retention housekeeping shares the cycle.
        let retention_cutoff =
            epoch_secs().saturating_sub(cfg.pipeline.retention_days * 86_400);
        let purged = self.activity.purge_before(retention_cutoff)?;
        if purged > 0 {
            tracing::info!(purged, "Purged aged-out detection records");
        }

        Ok(updated)
    }
}

fn build_profile(account_id: &str, sessions: &[&SessionRecord]) -> BehaviorProfile {
    let known_ips = sessions.iter().map(|s| s.source_ip).collect();
    let known_user_agents = sessions
        .iter()
        .filter_map(|s| s.user_agent.clone())
        .collect();

    let typical_request_interval_ms = if sessions.len() >= 3 {
        let gaps: Vec<u64> = sessions
            .windows(2)
            .map(|pair| pair[1].occurred_at.saturating_sub(pair[0].occurred_at) * 1000)
            .collect();
        Some(gaps.iter().sum::<u64>() / gaps.len() as u64)
    } else {
        None
    };

    BehaviorProfile {
        account_id: account_id.to_string(),
        known_ips,
        known_user_agents,
        typical_request_interval_ms,
        last_updated: epoch_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    use arc_swap::ArcSwap;

    use crate::config::EngineConfig;
    use crate::persist::memory::MemoryActivityStore;

    fn session(account: &str, ip: &str, ua: Option<&str>, at: u64) -> SessionRecord {
        SessionRecord {
            account_id: account.to_string(),
            source_ip: ip.parse().unwrap(),
            user_agent: ua.map(str::to_string),
            occurred_at: at,
        }
    }

    #[test]
    fn test_refresh_builds_profiles_from_history() {
        let config: ConfigHandle = Arc::new(ArcSwap::from_pointee(EngineConfig::default()));
        let profiles = Arc::new(ProfileStore::new());
        let activity = Arc::new(MemoryActivityStore::new(None));
        let now = epoch_secs();

        for record in [
            session("acct", "192.0.2.1", Some("firefox"), now - 3000),
            session("acct", "192.0.2.2", Some("firefox"), now - 2000),
            session("acct", "192.0.2.1", Some("safari"), now - 1000),
            session("other", "198.51.100.1", None, now - 500),
        ] {
            activity.record_session(record).unwrap();
        }

        let refresher = ProfileRefresher::new(profiles.clone(), activity, config);
        let updated = refresher.refresh_once().unwrap();
        assert_eq!(updated, 2);

        let profile = profiles.get("acct").unwrap();
        let ip: IpAddr = "192.0.2.2".parse().unwrap();
        assert!(profile.known_ips.contains(&ip));
        assert_eq!(profile.known_ips.len(), 2);
        assert!(profile.known_user_agents.contains("safari"));
        assert_eq!(profile.typical_request_interval_ms, Some(1_000_000));
    }

    #[test]
    fn test_old_sessions_fall_out_of_the_window() {
        let mut config = EngineConfig::default();
        config.anomaly.history_window_days = 1;
        let handle: ConfigHandle = Arc::new(ArcSwap::from_pointee(config));
        let profiles = Arc::new(ProfileStore::new());
        let activity = Arc::new(MemoryActivityStore::new(None));
        let now = epoch_secs();

        activity
            .record_session(session("acct", "192.0.2.1", None, now - 10 * 86_400))
            .unwrap();
        activity
            .record_session(session("acct", "192.0.2.2", None, now - 100))
            .unwrap();

        let refresher = ProfileRefresher::new(profiles.clone(), activity, handle);
        refresher.refresh_once().unwrap();

        let profile = profiles.get("acct").unwrap();
        assert_eq!(profile.known_ips.len(), 1);
        let recent: IpAddr = "192.0.2.2".parse().unwrap();
        assert!(profile.known_ips.contains(&recent));
    }
}
