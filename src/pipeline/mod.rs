//! Decision pipeline subsystem.
//!
//! The only component allowed to mutate the reputation store or raise an
//! incident; detectors hand it findings and it produces the final verdict.

pub mod audit;
pub mod context;
pub mod engine;
pub mod incident;

pub use audit::{AuditAction, AuditEvent, AuditSink, TracingAuditSink};
pub use context::{Evaluation, RequestContext, Verdict};
pub use engine::ThreatEngine;
pub use incident::{IncidentKind, IncidentStatus, SecurityIncident};
