//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a YAML or TOML file.
///
/// Files ending in `.toml` are parsed as TOML, everything else as YAML.
/// Static credentials missing from the file are taken from the process
/// environment before validation.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let mut config = parse_config(&content, is_toml)?;

    config.apply_env_fallbacks(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration text without touching the environment or validating.
pub fn parse_config(content: &str, is_toml: bool) -> Result<ProxyConfig, ConfigError> {
    if is_toml {
        Ok(toml::from_str(content)?)
    } else if content.trim().is_empty() {
        // serde_yaml rejects an empty document outright
        Ok(ProxyConfig::default())
    } else {
        Ok(serde_yaml::from_str(content)?)
    }
}
