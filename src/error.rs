//! Pipeline error taxonomy.
//!
//! # Policy
//! - `MalformedRecord`: logged, record skipped, processing continues
//! - `Delivery`: logged, the tick's record is dropped, producer loop continues
//! - `Connection`: fatal at startup
//! - `Session`: logged, subscriber rejoins the group
//!
//! Nothing other than a startup failure terminates the process.

use thiserror::Error;

use crate::broker::BrokerError;
use crate::config::loader::ConfigError;

/// Errors produced by the log pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Payload is not a valid encoded log entry.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Entry could not be encoded.
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// The broker client gave up on a message after its retry budget.
    #[error("delivery failed after {attempts} attempt(s): {source}")]
    Delivery {
        attempts: u32,
        #[source]
        source: BrokerError,
    },

    /// Broker client could not be established.
    #[error("cannot connect to broker: {0}")]
    Connection(#[source] BrokerError),

    /// Consumer-group session broke unexpectedly.
    #[error("consumer session error: {0}")]
    Session(#[source] BrokerError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Console or other local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Connection(_) | PipelineError::Config(_))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
