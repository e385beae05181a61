//! Shared counter and key-value store subsystem.
//!
//! # Data Flow
//! ```text
//! detectors / guard / scorer
//!     → SharedStore (atomic increment-with-TTL counters, TTL'd KV entries)
//!     → MemoryStore (in-process reference implementation)
//!
//! reputation.rs layers transient blocks and the permanent blacklist
//! on top of the store and the persistence contract.
//! ```
//!
//! # Design Decisions
//! - The store is an injected dependency behind a narrow trait, never a
//!   process-local singleton, so the engine stays horizontally scalable
//! - Counters are fixed-window: the TTL is armed on the first increment of
//!   a window and expiry resets the count to zero. Burst-at-boundary is an
//!   accepted trade-off of this model
//! - Increment-and-check is one atomic operation per key

pub mod memory;
pub mod reputation;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store did not answer within its bounded deadline.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Posture when a backing store cannot answer a check.
///
/// `Open` treats the signal as absent (availability wins), `Closed` treats
/// the source as bad (certainty wins). The right choice differs per store
/// and is configuration, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Open,
    Closed,
}

/// Shared, TTL-aware counter and key-value store.
///
/// All request-handling workers share one instance; every method must be
/// atomic per key under concurrent callers.
pub trait SharedStore: Send + Sync {
    /// Atomically increment `key` and return the post-increment count.
    ///
    /// The first increment of a window arms the TTL; once the window
    /// expires the counter resets to zero (fixed-window semantics).
    fn increment(&self, key: &str, window: Duration) -> Result<u64, StoreError>;

    /// Read a counter without incrementing. Expired counters read as zero.
    fn counter(&self, key: &str) -> Result<u64, StoreError>;

    /// Drop a counter, resetting it to zero.
    fn reset(&self, key: &str) -> Result<(), StoreError>;

    /// Store a value, optionally bounded by a TTL.
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Fetch a value. Expired entries read as `None`.
    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove a value.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// List live entries whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

/// Key builders for the counter families and KV entries the engine uses.
pub mod keys {
    use std::net::IpAddr;

    /// Global request counter for the DDoS layer.
    pub const GUARD_GLOBAL: &str = "guard:global";

    pub fn guard_ip(ip: IpAddr) -> String {
        format!("guard:ip:{ip}")
    }

    pub fn intrusions(ip: IpAddr) -> String {
        format!("intrusions:{ip}")
    }

    pub fn failed_auth(ip: IpAddr) -> String {
        format!("failed_auth:{ip}")
    }

    pub fn violations(ip: IpAddr) -> String {
        format!("violations:{ip}")
    }

    pub fn credential_stuffing(account: &str) -> String {
        format!("credential_stuffing:{account}")
    }

    pub fn block(ip: IpAddr) -> String {
        format!("block:{ip}")
    }

    pub fn repeat_blocks(ip: IpAddr) -> String {
        format!("repeat_blocks:{ip}")
    }
}

/// Seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
