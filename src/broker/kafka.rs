//! Kafka broker client built on rdkafka.
//!
//! # Data Flow
//! ```text
//! KafkaProducer::send → FutureProducer (librdkafka retries) → (partition, offset)
//!
//! KafkaConsumerGroup::join → fresh StreamConsumer → subscribe → wait for assignment
//!     → KafkaSession::next_record → recv → detach
//!     → KafkaMarker::mark → store_offset(offset + 1) → auto commit
//!     → close → synchronous commit → unsubscribe
//! ```
//!
//! # Design Decisions
//! - Offsets are stored only after a record is rendered; auto commit flushes
//!   stored offsets, so an unprocessed record is never committed
//! - Every join creates a new client, so a broken session cannot leak state
//!   into the next one
//! - librdkafka logs are forwarded to `tracing`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::client::ClientContext;
use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::Message;
use rdkafka::metadata::Metadata;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;

use crate::broker::{
    BrokerError, ConsumedRecord, ConsumerGroup, Delivery, GroupSession, MessageProducer,
    OffsetMarker, OutgoingMessage,
};
use crate::config::{BrokerConfig, ConsumerConfig, ProducerConfig};
use crate::error::{PipelineError, Result};
use crate::resilience::RetryPolicy;

/// Interval between assignment checks while joining.
const ASSIGNMENT_POLL: Duration = Duration::from_millis(100);

/// Deadline for flushing or committing on close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes librdkafka log lines and global errors into `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingContext;

impl ClientContext for TracingContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => {
                tracing::error!(facility = fac, "{}", log_message)
            }
            RDKafkaLogLevel::Warning => tracing::warn!(facility = fac, "{}", log_message),
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                tracing::info!(facility = fac, "{}", log_message)
            }
            RDKafkaLogLevel::Debug => tracing::debug!(facility = fac, "{}", log_message),
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        tracing::error!(error = %error, reason, "Kafka client error");
    }
}

impl ConsumerContext for TracingContext {}

type LogConsumer = StreamConsumer<TracingContext>;

fn client_id(role: &str) -> String {
    format!("log-stream-{role}-{}", uuid::Uuid::new_v4())
}

/// Client properties for the producer.
pub fn producer_client_config(broker: &BrokerConfig, producer: &ProducerConfig) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &broker.bootstrap_servers)
        .set("client.id", client_id("producer"))
        .set("acks", producer.acks.as_client_value())
        .set("message.send.max.retries", producer.max_retries.to_string())
        .set("retry.backoff.ms", producer.retry_backoff_ms.to_string())
        .set("message.timeout.ms", producer.message_timeout_ms.to_string())
        .set("enable.idempotence", "false");
    config
}

/// Client properties for one group member.
pub fn consumer_client_config(broker: &BrokerConfig, consumer: &ConsumerConfig) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &broker.bootstrap_servers)
        .set("client.id", client_id("consumer"))
        .set("group.id", &consumer.group_id)
        .set("enable.auto.commit", "true")
        .set("enable.auto.offset.store", "false")
        .set("auto.offset.reset", consumer.offset_reset.as_client_value())
        .set("session.timeout.ms", consumer.session_timeout_ms.to_string())
        .set("partition.assignment.strategy", "roundrobin");
    config
}

/// Fetch metadata for `topic` off the async runtime. Fails when the broker
/// cannot be reached within `timeout`.
async fn await_topic_metadata<F>(topic: &str, timeout: Duration, fetch: F) -> Result<()>
where
    F: FnOnce(&str, Duration) -> KafkaResult<Metadata> + Send + 'static,
{
    let name = topic.to_string();
    let partitions = tokio::task::spawn_blocking(move || {
        fetch(&name, timeout).map(|metadata| {
            metadata
                .topics()
                .iter()
                .find(|t| t.name() == name)
                .map_or(0, |t| t.partitions().len())
        })
    })
    .await
    .map_err(|e| PipelineError::Connection(BrokerError::Rejected(e.to_string())))?
    .map_err(|e| PipelineError::Connection(e.into()))?;

    if partitions == 0 {
        tracing::warn!(topic, "Topic has no partitions yet, relying on broker auto-creation");
    } else {
        tracing::debug!(topic, partitions, "Broker metadata fetched");
    }
    Ok(())
}

/// Producer client.
pub struct KafkaProducer {
    producer: FutureProducer<TracingContext>,
    retry: RetryPolicy,
    delivery_timeout: Duration,
}

impl KafkaProducer {
    /// Create the client and confirm the broker is reachable.
    pub async fn connect(broker: &BrokerConfig, producer: &ProducerConfig) -> Result<Self> {
        let client: FutureProducer<TracingContext> = producer_client_config(broker, producer)
            .create_with_context(TracingContext)
            .map_err(|e| PipelineError::Connection(e.into()))?;

        let handle = client.clone();
        await_topic_metadata(
            &broker.topic,
            Duration::from_millis(broker.connect_timeout_ms),
            move |topic, timeout| handle.client().fetch_metadata(Some(topic), timeout),
        )
        .await?;

        tracing::info!(
            bootstrap_servers = %broker.bootstrap_servers,
            acks = producer.acks.as_client_value(),
            "Kafka producer connected"
        );

        Ok(Self {
            producer: client,
            retry: RetryPolicy::from_config(producer),
            delivery_timeout: Duration::from_millis(producer.message_timeout_ms),
        })
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn send(&self, message: OutgoingMessage) -> std::result::Result<Delivery, BrokerError> {
        let record = FutureRecord::to(&message.topic)
            .key(message.key.as_str())
            .payload(message.payload.as_slice())
            .timestamp(message.timestamp_ms);

        self.producer
            .send(record, self.delivery_timeout)
            .await
            .map(|(partition, offset)| Delivery { partition, offset })
            .map_err(|(error, _message)| BrokerError::Kafka(error))
    }

    fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    async fn close(&self) -> std::result::Result<(), BrokerError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(CLOSE_TIMEOUT))
            .await
            .map_err(|e| BrokerError::Rejected(e.to_string()))??;
        tracing::debug!("Kafka producer flushed");
        Ok(())
    }
}

/// Consumer-group membership over Kafka.
pub struct KafkaConsumerGroup {
    broker: BrokerConfig,
    consumer: ConsumerConfig,
}

impl KafkaConsumerGroup {
    /// Confirm the broker is reachable. The group itself is joined later.
    pub async fn connect(broker: &BrokerConfig, consumer: &ConsumerConfig) -> Result<Self> {
        let handle: LogConsumer = consumer_client_config(broker, consumer)
            .create_with_context(TracingContext)
            .map_err(|e| PipelineError::Connection(e.into()))?;
        await_topic_metadata(
            &broker.topic,
            Duration::from_millis(broker.connect_timeout_ms),
            move |topic, timeout| handle.fetch_metadata(Some(topic), timeout),
        )
        .await?;

        tracing::info!(
            bootstrap_servers = %broker.bootstrap_servers,
            group_id = %consumer.group_id,
            "Kafka consumer connected"
        );

        Ok(Self {
            broker: broker.clone(),
            consumer: consumer.clone(),
        })
    }
}

fn to_record<M: Message>(message: &M) -> ConsumedRecord {
    ConsumedRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        timestamp_ms: message.timestamp().to_millis(),
    }
}

fn has_assignment(consumer: &LogConsumer) -> std::result::Result<bool, BrokerError> {
    Ok(consumer.assignment()?.count() > 0)
}

#[async_trait]
impl ConsumerGroup for KafkaConsumerGroup {
    async fn join(&self) -> std::result::Result<Box<dyn GroupSession>, BrokerError> {
        let consumer: LogConsumer = consumer_client_config(&self.broker, &self.consumer)
            .create_with_context(TracingContext)?;
        consumer.subscribe(&[self.broker.topic.as_str()])?;

        // The first fetch can land before an assignment check observes it;
        // keep that record for the session instead of dropping it.
        let deadline = Duration::from_millis(self.consumer.session_timeout_ms);
        let pending = tokio::time::timeout(deadline, async {
            loop {
                tokio::select! {
                    received = consumer.recv() => {
                        return Ok(Some(received.map(|m| to_record(&m)).map_err(BrokerError::from)));
                    }
                    _ = tokio::time::sleep(ASSIGNMENT_POLL) => {
                        match has_assignment(&consumer) {
                            Ok(true) => return Ok(None),
                            Ok(false) => {}
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        })
        .await
        .map_err(|_| {
            BrokerError::SessionLost(format!(
                "no partitions assigned to group '{}' within {}ms",
                self.consumer.group_id, self.consumer.session_timeout_ms
            ))
        })??;

        tracing::debug!(
            group_id = %self.consumer.group_id,
            topic = %self.broker.topic,
            "Joined consumer group"
        );

        Ok(Box::new(KafkaSession {
            consumer: Arc::new(consumer),
            group_id: self.consumer.group_id.clone(),
            pending,
        }))
    }

    fn group_id(&self) -> &str {
        &self.consumer.group_id
    }
}

struct KafkaSession {
    consumer: Arc<LogConsumer>,
    group_id: String,
    pending: Option<std::result::Result<ConsumedRecord, BrokerError>>,
}

#[async_trait]
impl GroupSession for KafkaSession {
    async fn next_record(&mut self) -> Option<std::result::Result<ConsumedRecord, BrokerError>> {
        if let Some(pending) = self.pending.take() {
            return Some(pending);
        }
        Some(
            self.consumer
                .recv()
                .await
                .map(|message| to_record(&message))
                .map_err(BrokerError::from),
        )
    }

    fn marker(&self) -> Arc<dyn OffsetMarker> {
        Arc::new(KafkaMarker {
            consumer: self.consumer.clone(),
        })
    }

    async fn close(self: Box<Self>) -> std::result::Result<(), BrokerError> {
        let consumer = self.consumer.clone();
        let committed = tokio::task::spawn_blocking(move || {
            let result = consumer.commit_consumer_state(CommitMode::Sync);
            consumer.unsubscribe();
            result
        })
        .await
        .map_err(|e| BrokerError::Rejected(e.to_string()))?;

        match committed {
            Ok(()) | Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                tracing::debug!(group_id = %self.group_id, "Kafka session closed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

struct KafkaMarker {
    consumer: Arc<LogConsumer>,
}

impl OffsetMarker for KafkaMarker {
    fn mark(&self, topic: &str, partition: i32, offset: i64) -> std::result::Result<(), BrokerError> {
        self.consumer.store_offset(topic, partition, offset + 1)?;
        Ok(())
    }
}
