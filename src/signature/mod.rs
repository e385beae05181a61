//! Signature detection subsystem.
//!
//! # Data Flow
//! ```text
//! untrusted input fields
//!     → patterns.rs (ordered regex tables per attack family)
//!     → detector.rs (pure first-match-wins scan)
//!     → SignatureMatch finding
//!     → decision pipeline (records IntrusionAttempt, applies blocks)
//! ```
//!
//! # Design Decisions
//! - Detection is side-effect free; all mutation happens in the pipeline
//! - Severity is fixed per attack family in the built-in table
//! - Malformed or empty input is a non-match, never an error

pub mod detector;
pub mod patterns;

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::store::epoch_secs;

pub use detector::{FieldMatch, SignatureDetector, SignatureMatch};
pub use patterns::{AttackType, PatternError, PatternSet, PatternSpec, Severity};

/// What the detector saw, kept server-side for investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Request field that carried the payload.
    pub field: String,
    /// Name of the signature pattern that fired.
    pub pattern: String,
    /// Truncated slice of the matching text.
    pub excerpt: String,
}

/// Immutable record of a positive signature detection.
///
/// Retained for a bounded window (90 days by default), then purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrusionAttempt {
    pub source_ip: IpAddr,
    pub account_id: Option<String>,
    pub attack_type: AttackType,
    pub severity: Severity,
    pub evidence: Evidence,
    /// Seconds since the Unix epoch.
    pub occurred_at: u64,
}

impl IntrusionAttempt {
    pub fn from_match(source_ip: IpAddr, account_id: Option<String>, hit: &FieldMatch) -> Self {
        Self {
            source_ip,
            account_id,
            attack_type: hit.matched.attack_type,
            severity: hit.matched.severity,
            evidence: Evidence {
                field: hit.field.clone(),
                pattern: hit.matched.pattern.clone(),
                excerpt: hit.matched.excerpt.clone(),
            },
            occurred_at: epoch_secs(),
        }
    }
}
