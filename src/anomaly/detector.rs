//! Deviation scoring against the account's behavior profile.

use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::anomaly::profile::ProfileStore;
use crate::config::ConfigHandle;
use crate::store::epoch_secs;
use crate::store::reputation::ReputationStore;

/// Risk level of a scored deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
    Critical,
}

/// Immutable record of a scored deviation, created only when at least one
/// flag triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyDetection {
    pub account_id: String,
    pub source_ip: IpAddr,
    pub score: u64,
    /// Named deviations, in detection order.
    pub anomalies: Vec<String>,
    pub risk: Risk,
    pub detected_at: u64,
}

pub struct AnomalyDetector {
    profiles: Arc<ProfileStore>,
    reputation: Arc<ReputationStore>,
    config: ConfigHandle,
}

impl AnomalyDetector {
    pub fn new(
        profiles: Arc<ProfileStore>,
        reputation: Arc<ReputationStore>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            profiles,
            reputation,
            config,
        }
    }

    /// Score a login/session event against the account's profile.
    ///
    /// Returns `None` when the account has no profile yet (nothing to
    /// deviate from) or no deviation triggered. A stale profile can only
    /// degrade detection quality, never block on its own: the worst case
    /// here is a challenge-or-block decision made by the caller.
    pub fn score(
        &self,
        account_id: &str,
        ip: IpAddr,
        user_agent: Option<&str>,
    ) -> Option<AnomalyDetection> {
        let profile = self.profiles.get(account_id)?;
        let cfg = self.config.load();
        let rules = &cfg.anomaly;

        let mut anomalies = Vec::new();

        if !profile.known_ips.contains(&ip) {
            anomalies.push("unknown_ip".to_string());
        }
        if let Some(ua) = user_agent {
            if !profile.known_user_agents.contains(ua) {
                anomalies.push("unknown_user_agent".to_string());
            }
        }

        // Rapid re-authentication alone is a tab refresh; it only counts
        // combined with another deviation.
        if !anomalies.is_empty() {
            if let Some(last) = self.profiles.last_session(account_id) {
                let elapsed = epoch_secs().saturating_sub(last);
                if elapsed < rules.rapid_session_floor_secs {
                    anomalies.push("rapid_session".to_string());
                }
            }
        }

        if anomalies.is_empty() {
            return None;
        }

        let flags = anomalies.len() as u64;
        let blacklisted = self.reputation.is_permanently_blacklisted(ip);
        let risk = if flags >= rules.critical_flags || blacklisted {
            Risk::Critical
        } else if flags >= rules.high_flags {
            Risk::High
        } else {
            Risk::Medium
        };

        Some(AnomalyDetection {
            account_id: account_id.to_string(),
            source_ip: ip,
            score: flags * rules.flag_weight,
            anomalies,
            risk,
            detected_at: epoch_secs(),
        })
    }
}
