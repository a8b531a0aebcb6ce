//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::PipelineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `broker.bootstrap_servers`.
pub const ENV_BROKERS: &str = "LOG_STREAM_BROKERS";
/// Environment variable overriding `broker.topic`.
pub const ENV_TOPIC: &str = "LOG_STREAM_TOPIC";
/// Environment variable overriding `consumer.group_id`.
pub const ENV_GROUP_ID: &str = "LOG_STREAM_GROUP_ID";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the effective configuration: file (or defaults), then environment
/// overrides, then validation.
pub fn resolve_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    resolve_with(path, |key| std::env::var(key).ok())
}

fn resolve_with<F>(path: Option<&Path>, lookup: F) -> Result<PipelineConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            Some(fs::read_to_string(path)?)
        }
        None => None,
    };
    resolve_content(content.as_deref(), lookup)
}

/// Parse (when there is a file), override, then validate. Validation runs
/// last so an override can fill in a value the file left blank.
fn resolve_content<F>(content: Option<&str>, lookup: F) -> Result<PipelineConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match content {
        Some(content) => toml::from_str(content)?,
        None => PipelineConfig::default(),
    };

    apply_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply overrides from a variable lookup. Blank values are ignored.
fn apply_overrides<F>(config: &mut PipelineConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(servers) = lookup(ENV_BROKERS) {
        config.broker.bootstrap_servers = servers;
    }
    if let Some(topic) = lookup(ENV_TOPIC) {
        config.broker.topic = topic;
    }
    if let Some(group_id) = lookup(ENV_GROUP_ID) {
        config.consumer.group_id = group_id;
    }
}
