//! Configuration validation.
//!
//! Semantic checks after serde has handled the syntax. Returns all
//! validation errors, not just the first, so a bad config is fixed in
//! one pass.

use std::fmt;

use crate::config::schema::EngineConfig;
use crate::signature::PatternSet;

/// One semantic problem in the configuration.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "not a valid socket address",
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a valid socket address",
        ));
    }

    if !config.signature.patterns.is_empty() {
        if let Err(e) = PatternSet::compile(&config.signature.patterns) {
            errors.push(ValidationError::new("signature.patterns", e.to_string()));
        }
    }

    for (field, value) in [
        ("counters.failed_auth_window_secs", config.counters.failed_auth_window_secs),
        (
            "counters.credential_stuffing_window_secs",
            config.counters.credential_stuffing_window_secs,
        ),
        ("counters.violation_window_secs", config.counters.violation_window_secs),
        ("counters.intrusion_window_secs", config.counters.intrusion_window_secs),
        ("guard.window_secs", config.guard.window_secs),
        ("guard.global_window_secs", config.guard.global_window_secs),
        ("reputation.base_block_secs", config.reputation.base_block_secs),
        ("scorer.block_threshold", config.scorer.block_threshold),
        ("guard.per_ip_limit", config.guard.per_ip_limit),
        ("guard.global_limit", config.guard.global_limit),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.guard.emergency_tighten_factor == 0 {
        errors.push(ValidationError::new(
            "guard.emergency_tighten_factor",
            "must be at least 1",
        ));
    }
    if config.guard.block_multiplier == 0 {
        errors.push(ValidationError::new(
            "guard.block_multiplier",
            "must be at least 1",
        ));
    }
    if config.reputation.critical_multiplier == 0 {
        errors.push(ValidationError::new(
            "reputation.critical_multiplier",
            "must be at least 1",
        ));
    }

    if config.anomaly.high_flags > config.anomaly.critical_flags {
        errors.push(ValidationError::new(
            "anomaly.high_flags",
            "must not exceed anomaly.critical_flags",
        ));
    }
    if config.anomaly.rapid_session_floor_secs == 0 {
        errors.push(ValidationError::new(
            "anomaly.rapid_session_floor_secs",
            "must be greater than zero",
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new(
            "admin.api_key",
            "must be set when the admin API is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EngineConfig::default();
        config.listener.bind_address = "nonsense".to_string();
        config.guard.per_ip_limit = 0;
        config.guard.emergency_tighten_factor = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"listener.bind_address"));
        assert!(fields.contains(&"guard.per_ip_limit"));
        assert!(fields.contains(&"guard.emergency_tighten_factor"));
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let mut config = EngineConfig::default();
        config.signature.patterns = vec![crate::signature::PatternSpec {
            name: "broken".to_string(),
            pattern: "(".to_string(),
            attack_type: crate::signature::AttackType::Xss,
            severity: crate::signature::Severity::High,
        }];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "signature.patterns");
    }

    #[test]
    fn test_flag_thresholds_ordered() {
        let mut config = EngineConfig::default();
        config.anomaly.high_flags = 4;
        config.anomaly.critical_flags = 3;
        assert!(validate_config(&config).is_err());
    }
}
