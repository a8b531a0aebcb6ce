//! Publishing log entries to the broker.
//!
//! # Data Flow
//! ```text
//! tick → Generator::next_entry → codec::encode
//!     → MessageProducer::send(key = application, timestamp = entry timestamp)
//!     → Delivery { partition, offset } | PipelineError::Delivery
//! ```
//!
//! # Design Decisions
//! - One sequential loop; a publish blocks the loop until acknowledged or failed
//! - A failed publish drops that tick's record and the loop carries on
//! - Shutdown is observed between ticks, never mid-publish

use rand::Rng;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::broker::{Delivery, MessageProducer, OutgoingMessage};
use crate::error::{PipelineError, Result};
use crate::generator::Generator;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::record::{codec, LogEntry};

/// Sends encoded entries to one topic.
pub struct Publisher<P> {
    producer: P,
    topic: String,
}

impl<P: MessageProducer> Publisher<P> {
    pub fn new(producer: P, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    /// Topic entries are published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Build the broker message for an entry.
    pub fn message_for(&self, entry: &LogEntry) -> Result<OutgoingMessage> {
        Ok(OutgoingMessage {
            topic: self.topic.clone(),
            key: entry.partition_key().to_string(),
            payload: codec::encode(entry)?,
            timestamp_ms: entry.timestamp_millis(),
        })
    }

    /// Publish an entry and wait for the broker's acknowledgement.
    pub async fn publish(&self, entry: &LogEntry) -> Result<Delivery> {
        let message = self.message_for(entry)?;
        self.producer
            .send(message)
            .await
            .map_err(|source| PipelineError::Delivery {
                attempts: self.producer.max_attempts(),
                source,
            })
    }

    /// Flush and release the broker client.
    pub async fn close(&self) {
        if let Err(e) = self.producer.close().await {
            tracing::warn!(error = %e, "Failed to close producer cleanly");
        }
    }
}

/// Outcome of a producer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub published: u64,
    pub failed: u64,
}

/// Run the tick → generate → publish loop until shutdown.
///
/// The first entry is produced one full interval after start.
pub async fn run_producer<P, R>(
    publisher: &Publisher<P>,
    generator: &mut Generator<R>,
    mut shutdown: ShutdownSignal,
) -> ProducerReport
where
    P: MessageProducer,
    R: Rng,
{
    let period = generator.interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut report = ProducerReport::default();

    tracing::info!(
        application = %generator.application(),
        topic = %publisher.topic(),
        interval_secs = period.as_secs(),
        "Producer started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let entry = generator.next_entry();
                match publisher.publish(&entry).await {
                    Ok(delivery) => {
                        report.published += 1;
                        metrics::record_published(&entry.application);
                        tracing::info!(
                            application = %entry.application,
                            partition = delivery.partition,
                            offset = delivery.offset,
                            level = %entry.level,
                            message = %entry.message,
                            "Sent log"
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        metrics::record_delivery_failure(&entry.application);
                        tracing::error!(
                            application = %entry.application,
                            error = %e,
                            "Dropping log entry"
                        );
                    }
                }
            }
        }
    }

    tracing::info!(
        application = %generator.application(),
        published = report.published,
        failed = report.failed,
        "Producer stopped"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::MemoryBroker;
    use crate::broker::BrokerError;
    use crate::lifecycle::Shutdown;
    use crate::record::LogLevel;
    use crate::resilience::RetryPolicy;
    use async_trait::async_trait;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records every message and acknowledges it at a fake position.
    #[derive(Clone, Default)]
    struct RecordingProducer {
        sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    }

    #[async_trait]
    impl MessageProducer for RecordingProducer {
        async fn send(&self, message: OutgoingMessage) -> std::result::Result<Delivery, BrokerError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(message);
            Ok(Delivery {
                partition: 0,
                offset: sent.len() as i64 - 1,
            })
        }

        fn max_attempts(&self) -> u32 {
            1
        }

        async fn close(&self) -> std::result::Result<(), BrokerError> {
            Ok(())
        }
    }

    fn entry(application: &str) -> LogEntry {
        LogEntry::new(Utc::now(), application, LogLevel::Info, "Request completed")
    }

    #[tokio::test]
    async fn test_message_uses_application_key_and_entry_timestamp() {
        let producer = RecordingProducer::default();
        let publisher = Publisher::new(producer.clone(), "raw-logs");

        let sent_entry = entry("AuthService");
        publisher.publish(&sent_entry).await.unwrap();

        let sent = producer.sent.lock().unwrap();
        assert_eq!(sent[0].topic, "raw-logs");
        assert_eq!(sent[0].key, "AuthService");
        assert_eq!(sent[0].timestamp_ms, sent_entry.timestamp_millis());
        assert_eq!(codec::decode(&sent[0].payload).unwrap(), sent_entry);
    }

    #[tokio::test]
    async fn test_partition_affinity() {
        let producer = RecordingProducer::default();
        let publisher = Publisher::new(producer.clone(), "raw-logs");
        for app in ["A", "B", "A", "B", "A"] {
            publisher.publish(&entry(app)).await.unwrap();
        }

        {
            let sent = producer.sent.lock().unwrap();
            let keys_for = |app: &str| {
                sent.iter()
                    .filter(|m| codec::decode(&m.payload).unwrap().application == app)
                    .map(|m| m.key.clone())
                    .collect::<Vec<_>>()
            };
            assert_eq!(keys_for("A"), vec!["A"; 3]);
            assert_eq!(keys_for("B"), vec!["B"; 2]);
        }

        let broker = MemoryBroker::new("raw-logs", 3);
        let publisher = Publisher::new(broker.producer(RetryPolicy::default()), "raw-logs");
        let first = publisher.publish(&entry("A")).await.unwrap();
        let second = publisher.publish(&entry("A")).await.unwrap();
        assert_eq!(first.partition, second.partition);
    }

    #[tokio::test]
    async fn test_delivery_error_after_retry_budget() {
        let broker = MemoryBroker::new("raw-logs", 3);
        let publisher = Publisher::new(
            broker.producer(RetryPolicy::new(2, Duration::from_millis(1))),
            "raw-logs",
        );

        broker.fail_next_sends(3);
        let err = publisher.publish(&entry("A")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Delivery { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_publishes_each_tick_and_survives_failures() {
        let broker = MemoryBroker::new("raw-logs", 3);
        let publisher = Publisher::new(
            broker.producer(RetryPolicy::new(0, Duration::from_millis(1))),
            "raw-logs",
        );
        let mut generator = Generator::new("PaymentService", StdRng::seed_from_u64(5), 2..=2);
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();

        broker.fail_next_sends(1);
        let run = run_producer(&publisher, &mut generator, signal);
        let stop = async {
            // Ticks at 2s, 4s, 6s; stop before the 8s tick.
            tokio::time::sleep(Duration::from_millis(7_000)).await;
            shutdown.trigger();
        };
        let (report, ()) = tokio::join!(run, stop);

        assert_eq!(report, ProducerReport { published: 2, failed: 1 });
        let partition = broker.partition_for(b"PaymentService");
        assert_eq!(broker.log_end_offset(partition), 2);
    }

    #[tokio::test]
    async fn test_loop_stops_before_first_tick() {
        let broker = MemoryBroker::new("raw-logs", 1);
        let publisher = Publisher::new(broker.producer(RetryPolicy::default()), "raw-logs");
        let mut generator = Generator::new("A", StdRng::seed_from_u64(1), 5..=5);
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let report = run_producer(&publisher, &mut generator, shutdown.subscribe()).await;
        assert_eq!(report, ProducerReport::default());
        assert_eq!(broker.log_end_offset(0), 0);
    }
}
