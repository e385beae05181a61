//! Request context and verdict types at the engine boundary.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Normalized view of one inbound request or auth event, supplied by the
/// host. Field values are untrusted input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub source_ip: IpAddr,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub endpoint: String,
    /// Endpoint touches authentication or account state.
    #[serde(default)]
    pub auth_sensitive: bool,
    /// This evaluation is a login/session-create event.
    #[serde(default)]
    pub login_event: bool,
    /// Untrusted input fields (body/query/header values) to scan.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(source_ip: IpAddr, endpoint: impl Into<String>) -> Self {
        Self {
            source_ip,
            account_id: None,
            user_agent: None,
            endpoint: endpoint.into(),
            auth_sensitive: false,
            login_event: false,
            fields: BTreeMap::new(),
        }
    }
}

/// The engine's final decision. Monotonic within an evaluation: once a
/// stage yields `Block`, later stages are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Challenge,
    Block,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Challenge => "challenge",
            Verdict::Block => "block",
        }
    }
}

/// Evaluation outcome handed back to the host.
///
/// Reasons are deliberately generic; detector internals (patterns,
/// thresholds, matched signatures) never leave the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// HTTP-style status hint for the caller to render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl Evaluation {
    pub fn allow() -> Self {
        Self {
            verdict: Verdict::Allow,
            reason: None,
            status: None,
        }
    }

    pub fn challenge() -> Self {
        Self {
            verdict: Verdict::Challenge,
            reason: Some("additional verification required".to_string()),
            status: None,
        }
    }

    pub fn block() -> Self {
        Self {
            verdict: Verdict::Block,
            reason: Some("request rejected".to_string()),
            status: Some(403),
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            verdict: Verdict::Block,
            reason: Some("rate limit exceeded, retry later".to_string()),
            status: Some(429),
        }
    }
}
