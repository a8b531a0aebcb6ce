//! In-process partitioned log.
//!
//! Stands in for the broker in tests and in the single-process demo. It keeps
//! the properties the pipeline relies on:
//! - one topic with a fixed partition count
//! - key-hashed partition assignment, so one key always maps to one partition
//! - dense, monotonically increasing offsets per partition
//! - per-group committed offsets; a new session resumes after the last mark
//!
//! Group coordination is single-member: a session owns every partition.
//! Failure injection (`fail_next_sends`, `fail_next_session`) drives the
//! delivery and session error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::broker::{
    BrokerError, ConsumedRecord, ConsumerGroup, Delivery, GroupSession, MessageProducer,
    OffsetMarker, OutgoingMessage,
};
use crate::resilience::RetryPolicy;

#[derive(Debug, Clone)]
struct StoredMessage {
    key: Option<Vec<u8>>,
    payload: Vec<u8>,
    timestamp_ms: i64,
}

#[derive(Debug)]
struct BrokerState {
    topic: String,
    partitions: Mutex<Vec<Vec<StoredMessage>>>,
    committed: Mutex<HashMap<(String, i32), i64>>,
    appended: watch::Sender<u64>,
    send_failures: AtomicU32,
    session_failures: AtomicU32,
    open_sessions: AtomicUsize,
}

impl BrokerState {
    fn partitions(&self) -> MutexGuard<'_, Vec<Vec<StoredMessage>>> {
        self.partitions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn committed(&self) -> MutexGuard<'_, HashMap<(String, i32), i64>> {
        self.committed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Consume one injected failure, if any are pending.
fn take_token(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// FNV-1a, stable across runs and platforms.
fn hash_key(key: &[u8]) -> u32 {
    key.iter().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(0x0100_0193)
    })
}

/// Handle to an in-process broker. Clones share the same log.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    /// Create a broker hosting `topic` with `partitions` partitions (at least one).
    pub fn new(topic: impl Into<String>, partitions: u32) -> Self {
        let count = partitions.max(1) as usize;
        let (appended, _) = watch::channel(0);
        Self {
            state: Arc::new(BrokerState {
                topic: topic.into(),
                partitions: Mutex::new(vec![Vec::new(); count]),
                committed: Mutex::new(HashMap::new()),
                appended,
                send_failures: AtomicU32::new(0),
                session_failures: AtomicU32::new(0),
                open_sessions: AtomicUsize::new(0),
            }),
        }
    }

    /// Topic hosted by this broker.
    pub fn topic(&self) -> &str {
        &self.state.topic
    }

    /// Number of partitions of the topic.
    pub fn partition_count(&self) -> i32 {
        self.state.partitions().len() as i32
    }

    /// Partition a key is routed to.
    pub fn partition_for(&self, key: &[u8]) -> i32 {
        (hash_key(key) % self.partition_count() as u32) as i32
    }

    /// Append a message, routing by key. Bypasses failure injection.
    pub fn append(&self, message: &OutgoingMessage) -> Result<Delivery, BrokerError> {
        if message.topic != self.state.topic {
            return Err(BrokerError::UnknownTopic(message.topic.clone()));
        }
        Ok(self.append_raw(
            Some(message.key.as_bytes()),
            message.payload.clone(),
            message.timestamp_ms,
        ))
    }

    /// Append raw bytes, routing by key (partition 0 when unkeyed).
    pub fn append_raw(&self, key: Option<&[u8]>, payload: Vec<u8>, timestamp_ms: i64) -> Delivery {
        let partition = key.map_or(0, |key| self.partition_for(key));
        let offset = {
            let mut partitions = self.state.partitions();
            let log = &mut partitions[partition as usize];
            log.push(StoredMessage {
                key: key.map(<[u8]>::to_vec),
                payload,
                timestamp_ms,
            });
            log.len() as i64 - 1
        };
        self.state.appended.send_modify(|count| *count += 1);
        Delivery { partition, offset }
    }

    /// Offset the next appended message in `partition` will get.
    pub fn log_end_offset(&self, partition: i32) -> i64 {
        self.state
            .partitions()
            .get(partition as usize)
            .map_or(0, |log| log.len() as i64)
    }

    /// Committed position of `group_id` in `partition`.
    pub fn committed_offset(&self, group_id: &str, partition: i32) -> Option<i64> {
        self.state
            .committed()
            .get(&(group_id.to_string(), partition))
            .copied()
    }

    /// Make the next `n` send attempts fail.
    pub fn fail_next_sends(&self, n: u32) {
        self.state.send_failures.fetch_add(n, Ordering::SeqCst);
    }

    /// Make the next pull of any open session report a lost session.
    pub fn fail_next_session(&self) {
        self.state.session_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Sessions currently joined.
    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    /// Producer client for this broker.
    pub fn producer(&self, retry: RetryPolicy) -> MemoryProducer {
        MemoryProducer {
            broker: self.clone(),
            retry,
        }
    }

    /// Consumer-group client for this broker. Groups without a committed
    /// offset start from the beginning of each partition.
    pub fn consumer_group(&self, group_id: impl Into<String>) -> MemoryConsumerGroup {
        MemoryConsumerGroup {
            broker: self.clone(),
            group_id: group_id.into(),
        }
    }
}

/// Producer client for a [`MemoryBroker`].
#[derive(Debug, Clone)]
pub struct MemoryProducer {
    broker: MemoryBroker,
    retry: RetryPolicy,
}

#[async_trait]
impl MessageProducer for MemoryProducer {
    async fn send(&self, message: OutgoingMessage) -> Result<Delivery, BrokerError> {
        let attempts = self.retry.max_attempts();
        for attempt in 1..=attempts {
            if !take_token(&self.broker.state.send_failures) {
                return self.broker.append(&message);
            }
            tracing::debug!(attempt, key = %message.key, "Send attempt failed");
            if attempt < attempts {
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
            }
        }
        Err(BrokerError::Rejected(format!(
            "no acknowledgement after {attempts} attempt(s)"
        )))
    }

    fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

/// Consumer-group client for a [`MemoryBroker`].
#[derive(Debug, Clone)]
pub struct MemoryConsumerGroup {
    broker: MemoryBroker,
    group_id: String,
}

#[async_trait]
impl ConsumerGroup for MemoryConsumerGroup {
    async fn join(&self) -> Result<Box<dyn GroupSession>, BrokerError> {
        let state = self.broker.state.clone();
        let positions = {
            let committed = state.committed();
            (0..self.broker.partition_count())
                .map(|partition| {
                    committed
                        .get(&(self.group_id.clone(), partition))
                        .copied()
                        .unwrap_or(0)
                })
                .collect()
        };
        let appended = state.appended.subscribe();
        state.open_sessions.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemorySession {
            state,
            group_id: self.group_id.clone(),
            positions,
            cursor: 0,
            appended,
        }))
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }
}

struct MemorySession {
    state: Arc<BrokerState>,
    group_id: String,
    positions: Vec<i64>,
    cursor: usize,
    appended: watch::Receiver<u64>,
}

impl MemorySession {
    /// Take the next unread record, rotating across partitions.
    fn poll_once(&mut self) -> Option<ConsumedRecord> {
        let partitions = self.state.partitions();
        let count = partitions.len();

        for step in 0..count {
            let partition = (self.cursor + step) % count;
            let position = self.positions[partition];
            if let Some(message) = partitions[partition].get(position as usize) {
                self.positions[partition] += 1;
                self.cursor = (partition + 1) % count;
                return Some(ConsumedRecord {
                    topic: self.state.topic.clone(),
                    partition: partition as i32,
                    offset: position,
                    key: message.key.clone(),
                    payload: message.payload.clone(),
                    timestamp_ms: Some(message.timestamp_ms),
                });
            }
        }
        None
    }
}

#[async_trait]
impl GroupSession for MemorySession {
    async fn next_record(&mut self) -> Option<Result<ConsumedRecord, BrokerError>> {
        loop {
            if take_token(&self.state.session_failures) {
                return Some(Err(BrokerError::SessionLost(format!(
                    "group '{}' coordinator unavailable",
                    self.group_id
                ))));
            }

            self.appended.borrow_and_update();
            if let Some(record) = self.poll_once() {
                return Some(Ok(record));
            }

            if self.appended.changed().await.is_err() {
                return None;
            }
        }
    }

    fn marker(&self) -> Arc<dyn OffsetMarker> {
        Arc::new(MemoryMarker {
            state: self.state.clone(),
            group_id: self.group_id.clone(),
        })
    }

    async fn close(self: Box<Self>) -> Result<(), BrokerError> {
        tracing::debug!(group_id = %self.group_id, "Memory session closed");
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MemoryMarker {
    state: Arc<BrokerState>,
    group_id: String,
}

impl OffsetMarker for MemoryMarker {
    fn mark(&self, topic: &str, partition: i32, offset: i64) -> Result<(), BrokerError> {
        if topic != self.state.topic {
            return Err(BrokerError::UnknownTopic(topic.to_string()));
        }
        let mut committed = self.state.committed();
        let position = committed
            .entry((self.group_id.clone(), partition))
            .or_insert(0);
        *position = (*position).max(offset + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn message(key: &str, payload: &str) -> OutgoingMessage {
        OutgoingMessage {
            topic: "raw-logs".into(),
            key: key.into(),
            payload: payload.as_bytes().to_vec(),
            timestamp_ms: 1_700_000_000_000,
        }
    }

    fn no_retry() -> RetryPolicy {
        RetryPolicy::new(0, Duration::from_millis(1))
    }

    #[test]
    fn test_same_key_same_partition_dense_offsets() {
        let broker = MemoryBroker::new("raw-logs", 3);
        let first = broker.append(&message("AuthService", "1")).unwrap();
        let second = broker.append(&message("AuthService", "2")).unwrap();

        assert_eq!(first.partition, second.partition);
        assert_eq!(first.partition, broker.partition_for(b"AuthService"));
        assert_eq!(second.offset, first.offset + 1);
        assert_eq!(broker.log_end_offset(first.partition), 2);
    }

    #[test]
    fn test_unknown_topic_rejected() {
        let broker = MemoryBroker::new("raw-logs", 3);
        let mut msg = message("a", "x");
        msg.topic = "other".into();
        assert!(matches!(broker.append(&msg), Err(BrokerError::UnknownTopic(t)) if t == "other"));
    }

    #[tokio::test]
    async fn test_producer_retries_until_budget_exhausted() {
        let broker = MemoryBroker::new("raw-logs", 1);
        let producer = broker.producer(RetryPolicy::new(2, Duration::from_millis(1)));

        broker.fail_next_sends(2);
        let delivery = producer.send(message("a", "ok")).await.unwrap();
        assert_eq!(delivery, Delivery { partition: 0, offset: 0 });

        broker.fail_next_sends(3);
        let err = producer.send(message("a", "lost")).await.unwrap_err();
        assert!(matches!(err, BrokerError::Rejected(_)));
        assert_eq!(broker.log_end_offset(0), 1);
    }

    #[tokio::test]
    async fn test_session_resumes_after_marked_offset() {
        let broker = MemoryBroker::new("raw-logs", 1);
        for i in 0..3 {
            broker.append(&message("a", &i.to_string())).unwrap();
        }
        let group = broker.consumer_group("g");

        let mut session = group.join().await.unwrap();
        let first = session.next_record().await.unwrap().unwrap();
        assert_eq!(first.offset, 0);
        session.marker().mark("raw-logs", 0, first.offset).unwrap();
        let _unmarked = session.next_record().await.unwrap().unwrap();
        session.close().await.unwrap();
        assert_eq!(broker.open_sessions(), 0);
        assert_eq!(broker.committed_offset("g", 0), Some(1));

        let mut session = group.join().await.unwrap();
        let resumed = session.next_record().await.unwrap().unwrap();
        assert_eq!(resumed.offset, 1);
        assert_eq!(resumed.payload, b"1");
    }

    #[tokio::test]
    async fn test_session_waits_for_new_records() {
        let broker = MemoryBroker::new("raw-logs", 2);
        let mut session = broker.consumer_group("g").join().await.unwrap();

        let producer = broker.producer(no_retry());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.send(message("late", "x")).await.unwrap()
        });

        let record = tokio::time::timeout(Duration::from_secs(2), session.next_record())
            .await
            .expect("record should arrive")
            .unwrap()
            .unwrap();
        let delivery = handle.await.unwrap();
        assert_eq!(record.position(), delivery);
        assert_eq!(record.key.as_deref(), Some(&b"late"[..]));
    }

    #[tokio::test]
    async fn test_injected_session_failure() {
        let broker = MemoryBroker::new("raw-logs", 1);
        let mut session = broker.consumer_group("g").join().await.unwrap();
        broker.fail_next_session();
        assert!(matches!(
            session.next_record().await,
            Some(Err(BrokerError::SessionLost(_)))
        ));
    }

    #[test]
    fn test_marks_never_move_backwards() {
        let broker = MemoryBroker::new("raw-logs", 1);
        let marker = MemoryMarker {
            state: broker.state.clone(),
            group_id: "g".into(),
        };
        marker.mark("raw-logs", 0, 5).unwrap();
        marker.mark("raw-logs", 0, 2).unwrap();
        assert_eq!(broker.committed_offset("g", 0), Some(6));
    }
}
