//! HTTP service edge.
//!
//! # Data Flow
//! ```text
//! host request-handling runtime
//!     → POST /v1/evaluate (normalized RequestContext)
//!     → ThreatEngine::evaluate
//!     → Evaluation { verdict, reason?, status? } rendered by the host
//!
//! host auth flow
//!     → POST /v1/events/auth (outcome report)
//!     → failed-auth / credential-stuffing counters, session history
//! ```

pub mod server;

pub use server::{AppState, AuthEventReport, EngineServer};
