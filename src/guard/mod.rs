//! Abuse-rate guard: per-source and global request-rate thresholds.
//!
//! # States
//! ```text
//! Per IP:   Normal → Suspicious (count > per-IP threshold in window)
//!                  → Exceeded   (count > threshold × block multiplier)
//! Global:   Normal → EmergencyMode (global count > global threshold)
//!                  → Normal        (after cool-down)
//! ```
//!
//! # Design Decisions
//! - The guard holds no state beyond threshold constants and the shared
//!   emergency flag; all counting lives in the shared store
//! - In EmergencyMode every per-IP threshold tightens by the configured
//!   factor and non-essential endpoints get an unconditional retry-later
//! - The cool-down is bounded: the flag clears itself even if traffic
//!   stays high, and the very next over-threshold increment re-arms it
//! - Counter-store failures fail open by default (availability over
//!   precision for rate signals)

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigHandle;
use crate::observability::metrics;
use crate::store::{epoch_millis, keys, FailurePolicy, SharedStore};

/// Outcome of the per-request rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Over the per-IP threshold; caller should challenge.
    Suspicious { count: u64, limit: u64 },
    /// Far enough over the threshold that the source should be blocked.
    Exceeded { count: u64, limit: u64 },
    /// Emergency mode shed: non-essential endpoint, retry later.
    RetryLater,
}

/// System-wide emergency flag, shared by every request handler.
#[derive(Default)]
pub struct EmergencyState {
    active: AtomicBool,
    since_ms: AtomicU64,
}

impl EmergencyState {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn activate(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            self.since_ms.store(epoch_millis(), Ordering::SeqCst);
            tracing::warn!("Emergency mode activated: global request rate over threshold");
            metrics::set_emergency(true);
        }
    }

    fn maybe_clear(&self, cooldown: Duration) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let since = self.since_ms.load(Ordering::SeqCst);
        if epoch_millis().saturating_sub(since) >= cooldown.as_millis() as u64
            && self.active.swap(false, Ordering::SeqCst)
        {
            tracing::info!("Emergency mode cleared after cool-down");
            metrics::set_emergency(false);
        }
    }
}

pub struct AbuseRateGuard {
    shared: Arc<dyn SharedStore>,
    config: ConfigHandle,
    emergency: Arc<EmergencyState>,
}

impl AbuseRateGuard {
    pub fn new(shared: Arc<dyn SharedStore>, config: ConfigHandle) -> Self {
        Self {
            shared,
            config,
            emergency: Arc::new(EmergencyState::default()),
        }
    }

    pub fn emergency(&self) -> &EmergencyState {
        &self.emergency
    }

    /// Count this request and decide. Cheapest check in the pipeline, so
    /// it runs first.
    pub fn check(&self, ip: IpAddr, endpoint: &str) -> GuardDecision {
        let cfg = self.config.load();
        let g = &cfg.guard;

        // Global rate drives the emergency flag.
        match self.shared.increment(
            keys::GUARD_GLOBAL,
            Duration::from_secs(g.global_window_secs),
        ) {
            Ok(total) if total > g.global_limit => self.emergency.activate(),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Global rate counter failed");
                metrics::record_store_error("guard_global");
            }
        }
        self.emergency
            .maybe_clear(Duration::from_secs(g.emergency_cooldown_secs));
        let emergency = self.emergency.is_active();

        if emergency
            && g.non_essential_endpoints
                .iter()
                .any(|prefix| endpoint.starts_with(prefix.as_str()))
        {
            return GuardDecision::RetryLater;
        }

        let mut limit = g.per_ip_limit;
        if emergency {
            limit = (limit / g.emergency_tighten_factor).max(1);
        }

        let count = match self
            .shared
            .increment(&keys::guard_ip(ip), Duration::from_secs(g.window_secs))
        {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(ip = %ip, error = %e, "Per-IP rate counter failed");
                metrics::record_store_error("guard_ip");
                return match cfg.counters.fail_policy {
                    FailurePolicy::Open => GuardDecision::Allow,
                    FailurePolicy::Closed => GuardDecision::RetryLater,
                };
            }
        };

        if count > limit * g.block_multiplier {
            GuardDecision::Exceeded { count, limit }
        } else if count > limit {
            // Suspicious traffic feeds the rate-limit-violation signal the
            // threat scorer reads.
            if let Err(e) = self.shared.increment(
                &keys::violations(ip),
                Duration::from_secs(cfg.counters.violation_window_secs),
            ) {
                tracing::warn!(ip = %ip, error = %e, "Violation counter failed");
                metrics::record_store_error("violations");
            }
            GuardDecision::Suspicious { count, limit }
        } else {
            GuardDecision::Allow
        }
    }
}
