//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! engine. All types derive Serde traits for deserialization from config
//! files, and every threshold the detectors use is policy here rather
//! than a hard-coded invariant.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::signature::{PatternSpec, Severity};
use crate::store::FailurePolicy;

/// Hot-reloadable configuration snapshot shared by all components.
pub type ConfigHandle = Arc<ArcSwap<EngineConfig>>;

/// Root configuration for the threat engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Listener configuration for the decision service.
    pub listener: ListenerConfig,

    /// Signature detector settings.
    pub signature: SignatureConfig,

    /// Counter windows and failure posture.
    pub counters: CounterConfig,

    /// Block durations and reputation failure posture.
    pub reputation: ReputationConfig,

    /// Threat score weights and threshold.
    pub scorer: ScorerConfig,

    /// Abuse-rate guard thresholds and emergency mode.
    pub guard: GuardConfig,

    /// Behavior anomaly detection settings.
    pub anomaly: AnomalyConfig,

    /// Pipeline-level policy.
    pub pipeline: PipelineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8088").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8088".to_string(),
            max_body_bytes: 256 * 1024,
            request_timeout_secs: 10,
        }
    }
}

/// Signature detector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignatureConfig {
    pub enabled: bool,

    /// Replacement pattern table. Empty means the built-in table.
    pub patterns: Vec<PatternSpec>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: Vec::new(),
        }
    }
}

/// Counter window configuration (fixed-window semantics).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Window for failed-auth counting per IP (threat scorer input).
    pub failed_auth_window_secs: u64,

    /// Window for per-account credential-stuffing counting.
    pub credential_stuffing_window_secs: u64,

    /// Attempts tolerated per credential-stuffing window before logins
    /// are challenged.
    pub credential_stuffing_limit: u64,

    /// Window for rate-limit-violation counting per IP.
    pub violation_window_secs: u64,

    /// Window for intrusion-attempt counting per IP.
    pub intrusion_window_secs: u64,

    /// Interval for the expired-entry sweep.
    pub sweep_interval_secs: u64,

    /// Posture when the counter store cannot answer. Open keeps traffic
    /// flowing when the store is down; Closed rejects on uncertainty.
    pub fail_policy: FailurePolicy,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            failed_auth_window_secs: 3600,
            credential_stuffing_window_secs: 300,
            credential_stuffing_limit: 5,
            violation_window_secs: 3600,
            intrusion_window_secs: 3600,
            sweep_interval_secs: 60,
            fail_policy: FailurePolicy::Open,
        }
    }
}

/// Reputation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Base transient block duration in seconds.
    pub base_block_secs: u64,

    /// Multiplier applied to the base duration for critical findings.
    pub critical_multiplier: u32,

    /// Window within which a prior block doubles the next one.
    pub repeat_window_secs: u64,

    /// Posture when the transient-block store cannot answer.
    pub transient_fail_policy: FailurePolicy,

    /// Posture when the permanent blacklist cannot answer.
    pub blacklist_fail_policy: FailurePolicy,

    /// Optional path for persisting the blacklist across restarts.
    pub blacklist_path: Option<String>,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            base_block_secs: 1800,
            critical_multiplier: 2,
            repeat_window_secs: 86_400,
            transient_fail_policy: FailurePolicy::Open,
            blacklist_fail_policy: FailurePolicy::Closed,
            blacklist_path: None,
        }
    }
}

/// Threat scorer weights. Values are policy, not invariants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub blacklist_weight: u64,
    pub intrusion_weight: u64,
    pub failed_auth_weight: u64,
    /// Failed-auth attempts are only scored once the count exceeds this.
    pub failed_auth_floor: u64,
    pub violation_weight: u64,
    /// Violations are only scored once the count exceeds this.
    pub violation_floor: u64,
    pub block_threshold: u64,
    /// Block duration on a threshold breach, in seconds.
    pub block_secs: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            blacklist_weight: 100,
            intrusion_weight: 20,
            failed_auth_weight: 5,
            failed_auth_floor: 5,
            violation_weight: 2,
            violation_floor: 10,
            block_threshold: 100,
            block_secs: 3600,
        }
    }
}

/// Abuse-rate guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    pub enabled: bool,

    /// Requests tolerated per IP per window.
    pub per_ip_limit: u64,

    /// Per-IP counting window in seconds.
    pub window_secs: u64,

    /// The per-IP count at `per_ip_limit * block_multiplier` escalates
    /// from challenge to block.
    pub block_multiplier: u64,

    /// Transient block duration for rate abusers, in seconds.
    pub block_secs: u64,

    /// Total requests across all sources per global window before
    /// emergency mode engages.
    pub global_limit: u64,

    /// Global counting window in seconds.
    pub global_window_secs: u64,

    /// Emergency mode clears after this many seconds.
    pub emergency_cooldown_secs: u64,

    /// Per-IP limits are divided by this factor in emergency mode.
    pub emergency_tighten_factor: u64,

    /// Endpoint prefixes shed unconditionally during emergency mode.
    pub non_essential_endpoints: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_ip_limit: 300,
            window_secs: 60,
            block_multiplier: 2,
            block_secs: 600,
            global_limit: 10_000,
            global_window_secs: 60,
            emergency_cooldown_secs: 300,
            emergency_tighten_factor: 2,
            non_essential_endpoints: Vec::new(),
        }
    }
}

/// Behavior anomaly configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub enabled: bool,

    /// A session under this many seconds after the last one is "too fast
    /// to be human" when combined with another deviation.
    pub rapid_session_floor_secs: u64,

    /// Score contribution per triggered flag.
    pub flag_weight: u64,

    /// Flag count at which risk becomes high.
    pub high_flags: u64,

    /// Flag count at which risk becomes critical.
    pub critical_flags: u64,

    /// Profile recompute interval in seconds.
    pub refresh_interval_secs: u64,

    /// Recency window for profile history, in days.
    pub history_window_days: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rapid_session_floor_secs: 60,
            flag_weight: 25,
            high_flags: 2,
            critical_flags: 3,
            refresh_interval_secs: 300,
            history_window_days: 90,
        }
    }
}

/// Pipeline-level policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum finding severity that raises a SecurityIncident.
    pub incident_min_severity: Severity,

    /// Detection records older than this are purged.
    pub retention_days: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            incident_min_severity: Severity::High,
            retention_days: 90,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
