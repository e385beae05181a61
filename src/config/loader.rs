//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: EngineConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [scorer]
            block_threshold = 150

            [guard]
            per_ip_limit = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.scorer.block_threshold, 150);
        assert_eq!(config.guard.per_ip_limit, 50);
        // Untouched sections keep their defaults.
        assert_eq!(config.scorer.intrusion_weight, 20);
        assert!(config.signature.enabled);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = std::env::temp_dir();
        let path = dir.join("vigil_test_invalid_config.toml");
        std::fs::write(&path, "[guard]\nper_ip_limit = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
