//! Publish retry policy.
//!
//! Retries belong to the broker client; this type carries the configured
//! budget to it. The Kafka client receives it as `message.send.max.retries`
//! and `retry.backoff.ms`, the in-process broker applies it directly.

use std::time::Duration;

use crate::config::ProducerConfig;
use crate::resilience::backoff::exponential_delay;

/// Ceiling on a single retry delay relative to the base backoff.
const MAX_BACKOFF_FACTOR: u32 = 10;

/// Bounded retry budget for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &ProducerConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.retry_backoff_ms))
    }

    /// Total attempts per message, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        exponential_delay(attempt, self.backoff, self.backoff * MAX_BACKOFF_FACTOR)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ProducerConfig::default())
    }
}
