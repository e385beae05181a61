//! Request-time threat detection and mitigation engine.

pub mod admin;
pub mod anomaly;
pub mod config;
pub mod guard;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod persist;
pub mod pipeline;
pub mod scorer;
pub mod signature;
pub mod store;

pub use config::{ConfigHandle, EngineConfig};
pub use http::EngineServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Evaluation, RequestContext, ThreatEngine, Verdict};
