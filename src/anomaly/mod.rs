//! Behavior anomaly detection subsystem.
//!
//! # Data Flow
//! ```text
//! successful sessions → ActivityStore (history)
//!     → refresh.rs (periodic batch recompute, off the request path)
//!     → profile.rs (atomic whole-record replacement)
//!
//! login/session event
//!     → detector.rs (read-only deviation scoring)
//!     → AnomalyDetection finding → decision pipeline
//! ```

pub mod detector;
pub mod profile;
pub mod refresh;

pub use detector::{AnomalyDetection, AnomalyDetector, Risk};
pub use profile::{BehaviorProfile, ProfileStore};
pub use refresh::ProfileRefresher;
