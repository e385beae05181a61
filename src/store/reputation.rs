//! IP reputation: transient blocks and the permanent blacklist.
//!
//! Transient blocks are TTL-bound entries in the shared KV store and lift
//! themselves; blacklist entries are durable and require explicit removal.
//! `is_blocked` is the union of both and is the single admission gate for
//! all downstream request processing.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigHandle;
use crate::observability::metrics;
use crate::persist::{ActivityStore, BlacklistEntry};
use crate::store::{epoch_secs, keys, FailurePolicy, SharedStore, StoreError};

/// A time-bounded block on a source IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpBlockEntry {
    pub ip: IpAddr,
    pub reason: String,
    pub created_at: u64,
    /// `None` marks a permanent blacklist entry.
    pub expires_at: Option<u64>,
}

pub struct ReputationStore {
    shared: Arc<dyn SharedStore>,
    activity: Arc<dyn ActivityStore>,
    config: ConfigHandle,
}

impl ReputationStore {
    pub fn new(
        shared: Arc<dyn SharedStore>,
        activity: Arc<dyn ActivityStore>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            shared,
            activity,
            config,
        }
    }

    /// Block an IP. A duration creates a transient, auto-expiring entry;
    /// `None` adds the IP to the permanent blacklist.
    pub fn block(
        &self,
        ip: IpAddr,
        reason: &str,
        duration: Option<Duration>,
    ) -> Result<IpBlockEntry, StoreError> {
        let now = epoch_secs();
        let entry = IpBlockEntry {
            ip,
            reason: reason.to_string(),
            created_at: now,
            expires_at: duration.map(|d| now + d.as_secs()),
        };
        match duration {
            Some(d) => {
                let payload = serde_json::to_string(&entry)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                self.shared.put(&keys::block(ip), &payload, Some(d))?;
            }
            None => {
                self.activity.add_blacklist(ip, reason)?;
            }
        }
        tracing::warn!(ip = %ip, reason, expires_at = ?entry.expires_at, "IP blocked");
        metrics::record_block(reason);
        Ok(entry)
    }

    /// Block with repeat-offender escalation: a prior block within the
    /// tracking window doubles the duration.
    pub fn block_escalating(
        &self,
        ip: IpAddr,
        reason: &str,
        base: Duration,
    ) -> Result<IpBlockEntry, StoreError> {
        let repeat_window = {
            let cfg = self.config.load();
            Duration::from_secs(cfg.reputation.repeat_window_secs)
        };
        let prior = self.shared.increment(&keys::repeat_blocks(ip), repeat_window)?;
        let duration = if prior > 1 { base * 2 } else { base };
        self.block(ip, reason, Some(duration))
    }

    /// Lift both the transient block and any blacklist entry.
    pub fn unblock(&self, ip: IpAddr) -> Result<(), StoreError> {
        self.shared.remove(&keys::block(ip))?;
        self.activity.remove_blacklist(ip)?;
        tracing::info!(ip = %ip, "IP unblocked");
        Ok(())
    }

    pub fn blacklist(&self, ip: IpAddr, reason: &str) -> Result<(), StoreError> {
        self.block(ip, reason, None).map(|_| ())
    }

    /// The live transient block entry for an IP, if any.
    pub fn transient_entry(&self, ip: IpAddr) -> Result<Option<IpBlockEntry>, StoreError> {
        match self.shared.fetch(&keys::block(ip))? {
            Some(payload) => Ok(serde_json::from_str(&payload).ok()),
            None => Ok(None),
        }
    }

    /// Union admission gate: true if either a transient block or a
    /// permanent blacklist entry exists.
    ///
    /// Store failures are folded per configured policy: the transient
    /// check defaults to fail open (a slow KV store must not reject all
    /// traffic), the blacklist check to fail closed (a known-bad IP must
    /// not slip through because an unrelated store is slow).
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        let transient = match self.transient_entry(ip) {
            Ok(entry) => entry.is_some(),
            Err(e) => {
                let policy = self.config.load().reputation.transient_fail_policy;
                tracing::warn!(ip = %ip, error = %e, ?policy, "Transient block check failed");
                metrics::record_store_error("transient_block_check");
                policy == FailurePolicy::Closed
            }
        };
        if transient {
            return true;
        }
        self.is_permanently_blacklisted(ip)
    }

    pub fn is_permanently_blacklisted(&self, ip: IpAddr) -> bool {
        match self.activity.is_blacklisted(ip) {
            Ok(listed) => listed,
            Err(e) => {
                let policy = self.config.load().reputation.blacklist_fail_policy;
                tracing::warn!(ip = %ip, error = %e, ?policy, "Blacklist check failed");
                metrics::record_store_error("blacklist_check");
                policy == FailurePolicy::Closed
            }
        }
    }

    /// All live transient blocks, for the admin surface.
    pub fn active_blocks(&self) -> Result<Vec<IpBlockEntry>, StoreError> {
        Ok(self
            .shared
            .scan_prefix("block:")?
            .into_iter()
            .filter_map(|(_, payload)| serde_json::from_str(&payload).ok())
            .collect())
    }

    pub fn blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        self.activity.blacklist_entries()
    }
}
