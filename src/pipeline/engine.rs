//! Decision pipeline: per-request orchestration of all detectors.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → reputation admission gate (transient ∪ permanent)
//!     → abuse-rate guard (cheapest, highest rejection rate)
//!     → signature detector (untrusted fields)
//!     → threat scorer (auth-sensitive endpoints)
//!     → anomaly detector (login/session events)
//!     → Evaluation { allow | challenge | block }
//! ```
//!
//! # Design Decisions
//! - Verdicts are monotonic: any `Block` short-circuits later stages
//! - Single-writer rule: detectors return findings; only this pipeline
//!   mutates the reputation store and raises incidents
//! - Record writes ride the retry queue; a persistence failure never
//!   alters the verdict already computed

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::anomaly::{AnomalyDetector, ProfileStore, Risk};
use crate::config::{ConfigHandle, EngineConfig};
use crate::guard::{AbuseRateGuard, GuardDecision};
use crate::observability::metrics;
use crate::persist::retry::{PendingWrite, RecordWriter};
use crate::persist::{ActivityStore, SessionRecord};
use crate::pipeline::audit::{AuditAction, AuditEvent, AuditSink};
use crate::pipeline::context::{Evaluation, RequestContext};
use crate::pipeline::incident::{IncidentKind, SecurityIncident};
use crate::scorer::ThreatScorer;
use crate::signature::{FieldMatch, IntrusionAttempt, PatternSet, Severity, SignatureDetector};
use crate::store::reputation::ReputationStore;
use crate::store::{epoch_secs, keys, SharedStore};

pub struct ThreatEngine {
    config: ConfigHandle,
    detector: SignatureDetector,
    shared: Arc<dyn SharedStore>,
    activity: Arc<dyn ActivityStore>,
    reputation: Arc<ReputationStore>,
    scorer: ThreatScorer,
    guard: AbuseRateGuard,
    anomaly: AnomalyDetector,
    profiles: Arc<ProfileStore>,
    writer: RecordWriter,
    audit: Arc<dyn AuditSink>,
}

impl ThreatEngine {
    /// Assemble the engine around injected stores. Returns the receiver
    /// end of the record-write retry queue; hand it to a
    /// [`crate::persist::retry::RetryWriter`].
    pub fn new(
        config: ConfigHandle,
        patterns: Arc<ArcSwap<PatternSet>>,
        shared: Arc<dyn SharedStore>,
        activity: Arc<dyn ActivityStore>,
        audit: Arc<dyn AuditSink>,
    ) -> (
        Self,
        tokio::sync::mpsc::UnboundedReceiver<PendingWrite>,
    ) {
        let reputation = Arc::new(ReputationStore::new(
            shared.clone(),
            activity.clone(),
            config.clone(),
        ));
        let profiles = Arc::new(ProfileStore::new());
        let scorer = ThreatScorer::new(shared.clone(), reputation.clone(), config.clone());
        let guard = AbuseRateGuard::new(shared.clone(), config.clone());
        let anomaly = AnomalyDetector::new(profiles.clone(), reputation.clone(), config.clone());
        let (writer, rx) = RecordWriter::new(activity.clone());
        let engine = Self {
            config,
            detector: SignatureDetector::new(patterns),
            shared,
            activity,
            reputation,
            scorer,
            guard,
            anomaly,
            profiles,
            writer,
            audit,
        };
        (engine, rx)
    }

    pub fn reputation(&self) -> &Arc<ReputationStore> {
        &self.reputation
    }

    pub fn activity(&self) -> &Arc<dyn ActivityStore> {
        &self.activity
    }

    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    pub fn emergency_active(&self) -> bool {
        self.guard.emergency().is_active()
    }

    /// Evaluate one request/event to a verdict.
    pub fn evaluate(&self, ctx: &RequestContext) -> Evaluation {
        let outcome = self.evaluate_stages(ctx);
        metrics::record_evaluation(outcome.verdict.as_str());
        outcome
    }

    fn evaluate_stages(&self, ctx: &RequestContext) -> Evaluation {
        let cfg = self.config.load();
        let ip = ctx.source_ip;

        // A non-expired block entry rejects the request before any
        // detector runs.
        if self.reputation.is_blocked(ip) {
            self.audit.emit(AuditEvent::new(
                AuditAction::RequestBlocked,
                ip,
                ctx.account_id.clone(),
                "source blocked",
            ));
            return Evaluation::block();
        }

        let mut challenged = false;

        if cfg.guard.enabled {
            match self.guard.check(ip, &ctx.endpoint) {
                GuardDecision::Allow => {}
                GuardDecision::RetryLater => {
                    self.audit.emit(AuditEvent::new(
                        AuditAction::RequestBlocked,
                        ip,
                        ctx.account_id.clone(),
                        "emergency load shedding",
                    ));
                    return Evaluation::rate_limited();
                }
                GuardDecision::Suspicious { count, limit } => {
                    tracing::debug!(ip = %ip, count, limit, "Request rate suspicious");
                    challenged = true;
                }
                GuardDecision::Exceeded { count, limit } => {
                    let base = Duration::from_secs(cfg.guard.block_secs);
                    if let Err(e) = self.reputation.block_escalating(ip, "rate_limit_exceeded", base)
                    {
                        tracing::warn!(ip = %ip, error = %e, "Failed to apply rate block");
                    }
                    self.raise_incident(
                        IncidentKind::RateAbuse,
                        Severity::High,
                        format!("request rate {count} over limit {limit} for {ip}"),
                        vec![ip.to_string()],
                    );
                    self.audit.emit(AuditEvent::new(
                        AuditAction::IpBlocked,
                        ip,
                        ctx.account_id.clone(),
                        "rate_limit_exceeded",
                    ));
                    return Evaluation::rate_limited();
                }
            }
        }

        if cfg.signature.enabled && !ctx.fields.is_empty() {
            let hit = self
                .detector
                .scan(ctx.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            if let Some(hit) = hit {
                return self.handle_intrusion(ctx, &cfg, hit);
            }
        }

        if ctx.auth_sensitive {
            let score = self.scorer.score(ip);
            if score.blocked {
                let base = Duration::from_secs(cfg.scorer.block_secs);
                if let Err(e) = self.reputation.block_escalating(ip, "high_threat_score", base) {
                    tracing::warn!(ip = %ip, error = %e, "Failed to apply threat-score block");
                }
                self.raise_incident(
                    IncidentKind::HighThreatScore,
                    Severity::High,
                    format!(
                        "threat score {} for {ip}: {}",
                        score.score,
                        score.reasons.join("; ")
                    ),
                    vec![ip.to_string()],
                );
                self.audit.emit(AuditEvent::new(
                    AuditAction::IpBlocked,
                    ip,
                    ctx.account_id.clone(),
                    "high_threat_score",
                ));
                return Evaluation::block();
            }
        }

        if ctx.login_event {
            if let Some(account) = ctx.account_id.as_deref() {
                let stuffing = self
                    .shared
                    .counter(&keys::credential_stuffing(account))
                    .unwrap_or(0);
                if stuffing > cfg.counters.credential_stuffing_limit {
                    tracing::debug!(account, stuffing, "Credential-stuffing pressure");
                    challenged = true;
                }

                if cfg.anomaly.enabled {
                    if let Some(detection) =
                        self.anomaly.score(account, ip, ctx.user_agent.as_deref())
                    {
                        let risk = detection.risk;
                        self.audit.emit(AuditEvent::new(
                            AuditAction::AnomalyDetected,
                            ip,
                            Some(account.to_string()),
                            detection.anomalies.join(","),
                        ));
                        self.raise_incident_for_anomaly(&detection);
                        self.writer.write(PendingWrite::Anomaly(detection));
                        match risk {
                            Risk::Critical => {
                                // Same blocking path as a critical
                                // signature match.
                                let duration = Duration::from_secs(cfg.reputation.base_block_secs)
                                    * cfg.reputation.critical_multiplier;
                                if let Err(e) = self.reputation.block(
                                    ip,
                                    "behavior_anomaly",
                                    Some(duration),
                                ) {
                                    tracing::warn!(ip = %ip, error = %e, "Failed to apply anomaly block");
                                }
                                self.audit.emit(AuditEvent::new(
                                    AuditAction::IpBlocked,
                                    ip,
                                    Some(account.to_string()),
                                    "behavior_anomaly",
                                ));
                                return Evaluation::block();
                            }
                            Risk::High | Risk::Medium => challenged = true,
                            Risk::Low => {}
                        }
                    }
                }
            }
        }

        if challenged {
            self.audit.emit(AuditEvent::new(
                AuditAction::ChallengeIssued,
                ip,
                ctx.account_id.clone(),
                "suspicious activity",
            ));
            Evaluation::challenge()
        } else {
            Evaluation::allow()
        }
    }

    fn handle_intrusion(
        &self,
        ctx: &RequestContext,
        cfg: &EngineConfig,
        hit: FieldMatch,
    ) -> Evaluation {
        let ip = ctx.source_ip;
        let severity = hit.matched.severity;
        let attack = hit.matched.attack_type;

        tracing::warn!(
            ip = %ip,
            field = %hit.field,
            attack = attack.as_str(),
            severity = severity.as_str(),
            "Attack signature matched"
        );
        metrics::record_detection(attack.as_str());

        if let Err(e) = self.shared.increment(
            &keys::intrusions(ip),
            Duration::from_secs(cfg.counters.intrusion_window_secs),
        ) {
            tracing::warn!(ip = %ip, error = %e, "Intrusion counter failed");
            metrics::record_store_error("intrusions");
        }

        let attempt = IntrusionAttempt::from_match(ip, ctx.account_id.clone(), &hit);
        self.writer.write(PendingWrite::Intrusion(attempt));
        self.audit.emit(AuditEvent::new(
            AuditAction::IntrusionDetected,
            ip,
            ctx.account_id.clone(),
            attack.as_str(),
        ));

        if severity == Severity::Critical {
            let duration = Duration::from_secs(cfg.reputation.base_block_secs)
                * cfg.reputation.critical_multiplier;
            if let Err(e) = self.reputation.block(ip, "intrusion_attempt", Some(duration)) {
                tracing::warn!(ip = %ip, error = %e, "Failed to apply intrusion block");
            }
            self.raise_incident(
                IncidentKind::IntrusionAttempt,
                severity,
                format!("{} detected from {ip}", attack.as_str()),
                vec![ip.to_string()],
            );
        }

        // Any signature match rejects the offending request.
        Evaluation::block()
    }

    fn raise_incident_for_anomaly(&self, detection: &crate::anomaly::AnomalyDetection) {
        let severity = match detection.risk {
            Risk::Low => Severity::Low,
            Risk::Medium => Severity::Medium,
            Risk::High => Severity::High,
            Risk::Critical => Severity::Critical,
        };
        self.raise_incident(
            IncidentKind::BehaviorAnomaly,
            severity,
            format!(
                "account {} deviated from profile: {}",
                detection.account_id,
                detection.anomalies.join(", ")
            ),
            vec![
                detection.account_id.clone(),
                detection.source_ip.to_string(),
            ],
        );
    }

    fn raise_incident(
        &self,
        kind: IncidentKind,
        severity: Severity,
        description: String,
        affected: Vec<String>,
    ) {
        let cfg = self.config.load();
        if severity < cfg.pipeline.incident_min_severity {
            return;
        }
        let incident = SecurityIncident::new(kind, severity, description, affected);
        self.audit.emit(AuditEvent::new(
            AuditAction::IncidentRaised,
            incident
                .affected
                .iter()
                .find_map(|a| a.parse().ok())
                .unwrap_or(IpAddr::from([0, 0, 0, 0])),
            None,
            incident.description.clone(),
        ));
        metrics::record_incident(severity.as_str());
        self.writer.write(PendingWrite::Incident(incident));
    }

    /// Host callback after a failed authentication attempt. Feeds the
    /// failed-auth and credential-stuffing counter families.
    pub fn record_auth_failure(&self, ip: IpAddr, account: Option<&str>) {
        let cfg = self.config.load();
        if let Err(e) = self.shared.increment(
            &keys::failed_auth(ip),
            Duration::from_secs(cfg.counters.failed_auth_window_secs),
        ) {
            tracing::warn!(ip = %ip, error = %e, "Failed-auth counter failed");
            metrics::record_store_error("failed_auth");
        }
        if let Some(account) = account {
            if let Err(e) = self.shared.increment(
                &keys::credential_stuffing(account),
                Duration::from_secs(cfg.counters.credential_stuffing_window_secs),
            ) {
                tracing::warn!(account, error = %e, "Credential-stuffing counter failed");
                metrics::record_store_error("credential_stuffing");
            }
        }
        self.audit.emit(AuditEvent::new(
            AuditAction::AuthFailureRecorded,
            ip,
            account.map(str::to_string),
            "authentication failed",
        ));
        metrics::record_auth_event(false);
    }

    /// Host callback after a successful authentication. Seeds the profile
    /// on first sight and appends to session history for the batch
    /// recompute.
    pub fn record_auth_success(&self, ip: IpAddr, account: &str, user_agent: Option<&str>) {
        self.profiles.seed_if_missing(account, ip, user_agent);
        let now = epoch_secs();
        self.writer.write(PendingWrite::Session(SessionRecord {
            account_id: account.to_string(),
            source_ip: ip,
            user_agent: user_agent.map(str::to_string),
            occurred_at: now,
        }));
        self.profiles.note_session(account, now);
        metrics::record_auth_event(true);
    }
}
