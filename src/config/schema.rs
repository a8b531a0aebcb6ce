//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for producers and subscribers.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Broker connection and topic.
    pub broker: BrokerConfig,

    /// Publisher delivery policy.
    pub producer: ProducerConfig,

    /// Consumer-group subscriber settings.
    pub consumer: ConsumerConfig,

    /// Synthetic log generation.
    pub generator: GeneratorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Broker connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Comma separated bootstrap servers (e.g., "localhost:9092").
    pub bootstrap_servers: String,

    /// Topic carrying the log records.
    pub topic: String,

    /// Partition count of the topic. The topic is provisioned externally;
    /// the in-process broker creates it with this many partitions.
    pub partitions: u32,

    /// Deadline for the startup metadata fetch in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "raw-logs".to_string(),
            partitions: 3,
            connect_timeout_ms: 5000,
        }
    }
}

/// Acknowledgement level required before a publish counts as delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Acks {
    /// Every in-sync replica must acknowledge.
    #[default]
    All,
    /// Partition leader only.
    Leader,
    /// Fire and forget.
    None,
}

impl Acks {
    /// Value of the client's `acks` property.
    pub fn as_client_value(&self) -> &'static str {
        match self {
            Acks::All => "all",
            Acks::Leader => "1",
            Acks::None => "0",
        }
    }
}

/// Publisher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Acknowledgement level.
    pub acks: Acks,

    /// Retries performed by the broker client before a delivery fails.
    pub max_retries: u32,

    /// Backoff between client retries in milliseconds.
    pub retry_backoff_ms: u64,

    /// Upper bound on the time a message may wait for delivery, retries included.
    pub message_timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            acks: Acks::All,
            max_retries: 3,
            retry_backoff_ms: 100,
            message_timeout_ms: 30_000,
        }
    }
}

/// Where a group with no committed offset starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    /// Value of the client's `auto.offset.reset` property.
    pub fn as_client_value(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

/// Subscriber configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Consumer group identifier.
    pub group_id: String,

    /// Start position when the group has no committed offset.
    pub offset_reset: OffsetReset,

    /// Group session timeout in milliseconds.
    pub session_timeout_ms: u64,

    /// Grace period for in-flight records on shutdown, in milliseconds.
    pub drain_grace_ms: u64,

    /// Base delay before rejoining after a session failure.
    pub rejoin_base_delay_ms: u64,

    /// Maximum delay between rejoin attempts.
    pub rejoin_max_delay_ms: u64,

    /// Records buffered per partition worker.
    pub queue_depth: usize,

    /// Colour rendered lines by level.
    pub color: bool,

    /// Render timestamps in UTC instead of local time.
    pub utc: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: "log-consumer-group".to_string(),
            offset_reset: OffsetReset::Earliest,
            session_timeout_ms: 30_000,
            drain_grace_ms: 5000,
            rejoin_base_delay_ms: 200,
            rejoin_max_delay_ms: 10_000,
            queue_depth: 256,
            color: true,
            utc: false,
        }
    }
}

/// Synthetic log generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Simulated application names a producer picks from at start.
    pub applications: Vec<String>,

    /// Lower bound of the tick interval in seconds.
    pub min_interval_secs: u64,

    /// Upper bound of the tick interval in seconds.
    pub max_interval_secs: u64,

    /// Seed for the random source; random when absent.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            applications: vec![
                "userService".to_string(),
                "DatabaseService".to_string(),
                "AuthService".to_string(),
                "PaymentService".to_string(),
            ],
            min_interval_secs: 1,
            max_interval_secs: 5,
            seed: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [broker]
            topic = "app-logs"

            [producer]
            acks = "leader"
            "#,
        )
        .unwrap();

        assert_eq!(config.broker.topic, "app-logs");
        assert_eq!(config.broker.bootstrap_servers, "localhost:9092");
        assert_eq!(config.producer.acks, Acks::Leader);
        assert_eq!(config.producer.max_retries, 3);
        assert_eq!(config.consumer.group_id, "log-consumer-group");
        assert_eq!(config.generator.applications.len(), 4);
    }

    #[test]
    fn test_client_values() {
        assert_eq!(Acks::All.as_client_value(), "all");
        assert_eq!(Acks::Leader.as_client_value(), "1");
        assert_eq!(Acks::None.as_client_value(), "0");
        assert_eq!(OffsetReset::Latest.as_client_value(), "latest");
    }
}
