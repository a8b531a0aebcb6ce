//! Broker client seam.
//!
//! # Data Flow
//! ```text
//! Publisher → MessageProducer::send(OutgoingMessage) → Delivery { partition, offset }
//!
//! Subscriber → ConsumerGroup::join() → GroupSession
//!     → next_record() → ConsumedRecord → partition worker
//!     → OffsetMarker::mark(partition, offset)
//!     → close() (commit, release)
//! ```
//!
//! # Design Decisions
//! - Partitioning, replication, rebalancing and offset storage belong to the
//!   broker; these traits only expose what the pipeline calls
//! - `kafka` wraps rdkafka, `memory` is an in-process log for tests and the demo
//! - Marking is decoupled from the session so partition workers can mark
//!   without holding the pull loop

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a broker client.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[cfg(feature = "kafka")]
    #[error(transparent)]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The broker rejected the request.
    #[error("broker rejected request: {0}")]
    Rejected(String),

    /// The group session was lost (rebalance failure, coordinator gone).
    #[error("group session lost: {0}")]
    SessionLost(String),

    /// The topic does not exist on the broker.
    #[error("topic '{0}' does not exist")]
    UnknownTopic(String),

    /// The client was closed.
    #[error("broker client closed")]
    Closed,

    /// The binary was built without a client for this broker.
    #[error("broker client unavailable: {0}")]
    Unsupported(String),
}

/// A message handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// Position the broker assigned to a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// A message pulled from the broker within a group session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub timestamp_ms: Option<i64>,
}

impl ConsumedRecord {
    /// Partition and offset of this record.
    pub fn position(&self) -> Delivery {
        Delivery {
            partition: self.partition,
            offset: self.offset,
        }
    }
}

/// Producer side of a broker client.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Send a message and wait for the broker's acknowledgement. Retries,
    /// when configured, happen inside the client.
    async fn send(&self, message: OutgoingMessage) -> Result<Delivery, BrokerError>;

    /// Attempts the client makes per message before giving up.
    fn max_attempts(&self) -> u32;

    /// Flush outstanding messages and release the client.
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Consumer-group membership.
#[async_trait]
pub trait ConsumerGroup: Send + Sync {
    /// Join the group. Resolves once the session is established and the
    /// member owns its partitions.
    async fn join(&self) -> Result<Box<dyn GroupSession>, BrokerError>;

    /// Group identifier.
    fn group_id(&self) -> &str;
}

/// An established consumer-group session.
#[async_trait]
pub trait GroupSession: Send {
    /// Pull the next record. `None` means the broker ended the session
    /// (e.g. a rebalance revoked everything) and the member should rejoin.
    ///
    /// Must be cancel safe: a record is either returned or left on the broker.
    async fn next_record(&mut self) -> Option<Result<ConsumedRecord, BrokerError>>;

    /// Handle used to mark records processed from other tasks.
    fn marker(&self) -> Arc<dyn OffsetMarker>;

    /// Commit marked offsets and release the session.
    async fn close(self: Box<Self>) -> Result<(), BrokerError>;
}

/// Marks records as processed so a restart resumes after them.
pub trait OffsetMarker: Send + Sync {
    /// Mark the record at `offset` processed; the committed position becomes
    /// `offset + 1`.
    fn mark(&self, topic: &str, partition: i32, offset: i64) -> Result<(), BrokerError>;
}
