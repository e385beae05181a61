//! Threat scoring: aggregate abuse signals into one number.
//!
//! # Design Decisions
//! - Scoring is a pure read-aggregation over the counters and blacklist;
//!   two calls in the same window with no new events return the same score
//! - All weights, floors, and the threshold are configuration
//! - The scorer never blocks anything itself; the pipeline acts on
//!   `blocked == true`

use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ConfigHandle;
use crate::observability::metrics;
use crate::store::reputation::ReputationStore;
use crate::store::{keys, FailurePolicy, SharedStore};

/// Ephemeral, recomputed per evaluation; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ThreatScore {
    pub ip: IpAddr,
    pub score: u64,
    /// Ordered contributions, highest-weight signal first.
    pub reasons: Vec<String>,
    pub blocked: bool,
}

pub struct ThreatScorer {
    shared: Arc<dyn SharedStore>,
    reputation: Arc<ReputationStore>,
    config: ConfigHandle,
}

impl ThreatScorer {
    pub fn new(
        shared: Arc<dyn SharedStore>,
        reputation: Arc<ReputationStore>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            shared,
            reputation,
            config,
        }
    }

    pub fn score(&self, ip: IpAddr) -> ThreatScore {
        let cfg = self.config.load();
        let weights = &cfg.scorer;

        let mut score: u64 = 0;
        let mut reasons = Vec::new();

        if self.reputation.is_permanently_blacklisted(ip) {
            score += weights.blacklist_weight;
            reasons.push("permanently blacklisted".to_string());
        }

        let intrusions = self.read_counter(&keys::intrusions(ip), cfg.counters.fail_policy);
        if intrusions > 0 {
            score += intrusions * weights.intrusion_weight;
            reasons.push(format!("{intrusions} intrusion attempts in window"));
        }

        let failed_auth = self.read_counter(&keys::failed_auth(ip), cfg.counters.fail_policy);
        if failed_auth > weights.failed_auth_floor {
            score += failed_auth * weights.failed_auth_weight;
            reasons.push(format!("{failed_auth} failed authentication attempts in window"));
        }

        let violations = self.read_counter(&keys::violations(ip), cfg.counters.fail_policy);
        if violations > weights.violation_floor {
            score += violations * weights.violation_weight;
            reasons.push(format!("{violations} rate limit violations in window"));
        }

        let blocked = score >= weights.block_threshold;
        if blocked {
            tracing::warn!(ip = %ip, score, threshold = weights.block_threshold, "Threat score over threshold");
        }
        ThreatScore {
            ip,
            score,
            reasons,
            blocked,
        }
    }

    /// Counter read with the configured failure posture. `Open` treats an
    /// unreachable counter as zero so a slow store never inflates scores.
    fn read_counter(&self, key: &str, policy: FailurePolicy) -> u64 {
        match self.shared.counter(key) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(key, error = %e, ?policy, "Counter read failed");
                metrics::record_store_error("counter_read");
                match policy {
                    FailurePolicy::Open => 0,
                    // Closed posture: treat the signal as already over its
                    // floor so uncertainty counts against the source.
                    FailurePolicy::Closed => u64::MAX / 1_000_000,
                }
            }
        }
    }
}
