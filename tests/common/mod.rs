//! Shared utilities for pipeline integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use log_stream::broker::memory::MemoryBroker;
use log_stream::broker::Delivery;
use log_stream::lifecycle::Shutdown;
use log_stream::publisher::Publisher;
use log_stream::record::{LogEntry, LogLevel};
use log_stream::resilience::RetryPolicy;
use log_stream::subscriber::{OutputSink, RenderStyle, Subscriber, SubscriberOptions, SubscriberReport};

/// Subscriber settings with fast rejoins and plain UTC output.
pub fn test_options() -> SubscriberOptions {
    SubscriberOptions {
        style: RenderStyle { color: false, utc: true },
        queue_depth: 16,
        drain_grace: Duration::from_secs(5),
        rejoin_base_delay: Duration::from_millis(5),
        rejoin_max_delay: Duration::from_millis(50),
    }
}

/// Publish one INFO entry per message as `application`.
pub async fn publish_all(broker: &MemoryBroker, application: &str, messages: &[String]) -> Vec<Delivery> {
    let publisher = Publisher::new(
        broker.producer(RetryPolicy::new(0, Duration::from_millis(1))),
        broker.topic().to_string(),
    );
    let mut deliveries = Vec::with_capacity(messages.len());
    for message in messages {
        let entry = LogEntry::new(Utc::now(), application, LogLevel::Info, message.as_str());
        deliveries.push(publisher.publish(&entry).await.expect("publish to memory broker"));
    }
    deliveries
}

/// A running subscriber and the means to stop it.
pub struct RunningSubscriber {
    pub shutdown: Shutdown,
    pub handle: JoinHandle<SubscriberReport>,
}

impl RunningSubscriber {
    pub async fn stop(self) -> SubscriberReport {
        self.shutdown.trigger();
        self.handle.await.expect("subscriber task")
    }
}

/// Start a subscriber for `group_id` writing to `sink`.
pub fn spawn_subscriber(broker: &MemoryBroker, group_id: &str, sink: OutputSink) -> RunningSubscriber {
    let shutdown = Shutdown::new();
    let subscriber = Subscriber::new(broker.consumer_group(group_id), sink, test_options());
    let handle = tokio::spawn(subscriber.run(shutdown.subscribe()));
    RunningSubscriber { shutdown, handle }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Await `future`, failing the test if it takes longer than five seconds.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Partition and offset parsed from a rendered line's `(p:P, o:O)` suffix.
pub fn position_of(line: &str) -> Delivery {
    let start = line.rfind("(p:").expect("partition annotation");
    let inner = line[start + 3..].trim_end_matches(')');
    let (partition, offset) = inner.split_once(", o:").expect("offset annotation");
    Delivery {
        partition: partition.parse().expect("numeric partition"),
        offset: offset.parse().expect("numeric offset"),
    }
}

/// Messages "<prefix>-0" .. "<prefix>-(n-1)".
pub fn numbered(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}-{i}")).collect()
}
