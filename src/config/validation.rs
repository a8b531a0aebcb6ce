//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals, partitions, queue depth)
//! - Validate addresses the process will bind
//!
//! Returns all validation errors, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::PipelineConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{lower} ({lower_value}) exceeds {upper} ({upper_value})")]
    InvertedRange {
        lower: &'static str,
        lower_value: u64,
        upper: &'static str,
        upper_value: u64,
    },

    #[error("generator.applications contains a blank name")]
    BlankApplication,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.broker.bootstrap_servers.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "broker.bootstrap_servers" });
    }
    if config.broker.topic.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "broker.topic" });
    }
    if config.broker.partitions == 0 {
        errors.push(ValidationError::Zero { field: "broker.partitions" });
    }
    if config.broker.connect_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "broker.connect_timeout_ms" });
    }
    if config.producer.message_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "producer.message_timeout_ms" });
    }

    let consumer = &config.consumer;
    if consumer.group_id.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "consumer.group_id" });
    }
    if consumer.queue_depth == 0 {
        errors.push(ValidationError::Zero { field: "consumer.queue_depth" });
    }
    if consumer.drain_grace_ms == 0 {
        errors.push(ValidationError::Zero { field: "consumer.drain_grace_ms" });
    }
    if consumer.session_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "consumer.session_timeout_ms" });
    }
    if consumer.rejoin_base_delay_ms > consumer.rejoin_max_delay_ms {
        errors.push(ValidationError::InvertedRange {
            lower: "consumer.rejoin_base_delay_ms",
            lower_value: consumer.rejoin_base_delay_ms,
            upper: "consumer.rejoin_max_delay_ms",
            upper_value: consumer.rejoin_max_delay_ms,
        });
    }

    let generator = &config.generator;
    if generator.applications.is_empty() {
        errors.push(ValidationError::Empty { field: "generator.applications" });
    } else if generator.applications.iter().any(|name| name.trim().is_empty()) {
        errors.push(ValidationError::BlankApplication);
    }
    if generator.min_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "generator.min_interval_secs" });
    }
    if generator.min_interval_secs > generator.max_interval_secs {
        errors.push(ValidationError::InvertedRange {
            lower: "generator.min_interval_secs",
            lower_value: generator.min_interval_secs,
            upper: "generator.max_interval_secs",
            upper_value: generator.max_interval_secs,
        });
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
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
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&PipelineConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = PipelineConfig::default();
        config.broker.topic = " ".into();
        config.broker.partitions = 0;
        config.generator.min_interval_secs = 6;
        config.generator.applications.push(String::new());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Empty { field: "broker.topic" }));
        assert!(errors.contains(&ValidationError::Zero { field: "broker.partitions" }));
        assert!(errors.contains(&ValidationError::BlankApplication));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = PipelineConfig::default();
        config.observability.metrics_address = "not-an-addr".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::MetricsAddress("not-an-addr".into())]
        );
    }

    #[test]
    fn test_inverted_rejoin_delays() {
        let mut config = PipelineConfig::default();
        config.consumer.rejoin_base_delay_ms = 500;
        config.consumer.rejoin_max_delay_ms = 100;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "consumer.rejoin_base_delay_ms (500) exceeds consumer.rejoin_max_delay_ms (100)"
        );
    }

    #[test]
    fn test_zero_consumer_timeouts() {
        let mut config = PipelineConfig::default();
        config.consumer.drain_grace_ms = 0;
        config.consumer.session_timeout_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Zero { field: "consumer.drain_grace_ms" },
                ValidationError::Zero { field: "consumer.session_timeout_ms" },
            ]
        );
    }
}
