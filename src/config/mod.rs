//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors reported)
//!     → EngineConfig (validated, immutable snapshot)
//!     → shared via ArcSwap to all components
//!
//! On reload:
//!     watcher.rs detects change
//!     → loader.rs loads & validates new config
//!     → atomic swap of the Arc<EngineConfig> snapshot
//!     → components observe new thresholds on their next evaluation
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes arrive as whole snapshots
//! - All fields have defaults so a minimal config file works
//! - Every detector threshold is configuration, not a hard-coded constant

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AnomalyConfig, ConfigHandle, CounterConfig, EngineConfig, GuardConfig,
    ListenerConfig, ObservabilityConfig, PipelineConfig, ReputationConfig, ScorerConfig,
    SignatureConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
