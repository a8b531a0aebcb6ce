//! Failure injection tests for the log pipeline.

use std::time::Duration;

use chrono::Utc;

use log_stream::broker::memory::MemoryBroker;
use log_stream::error::PipelineError;
use log_stream::publisher::Publisher;
use log_stream::record::{LogEntry, LogLevel};
use log_stream::resilience::RetryPolicy;
use log_stream::subscriber::OutputSink;

mod common;

use common::{numbered, position_of, publish_all, spawn_subscriber, wait_until};

#[tokio::test]
async fn test_malformed_record_skipped_and_consumption_continues() {
    let broker = MemoryBroker::new("raw-logs", 1);
    broker.append_raw(Some(b"A"), b"definitely not json".to_vec(), 0);
    broker.append_raw(Some(b"A"), br#"{"timestamp":"2024-05-01T10:00:00.000Z","application":"A","level":"TRACE","message":"x"}"#.to_vec(), 0);
    publish_all(&broker, "A", &["after the bad ones".to_string()]).await;

    let (sink, output) = OutputSink::capture();
    let running = spawn_subscriber(&broker, "g", sink);
    assert!(wait_until(Duration::from_secs(5), || output.lines().len() >= 1).await);
    assert!(wait_until(Duration::from_secs(5), || broker.committed_offset("g", 0) == Some(3)).await);
    let report = running.stop().await;

    assert_eq!(report.rendered, 1);
    assert_eq!(report.malformed, 2);
    let lines = output.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("after the bad ones (p:0, o:2)"));
}

#[tokio::test]
async fn test_delivery_failure_drops_record_and_publisher_recovers() {
    let broker = MemoryBroker::new("raw-logs", 1);
    let publisher = Publisher::new(
        broker.producer(RetryPolicy::new(2, Duration::from_millis(1))),
        "raw-logs",
    );
    let entry = |message: &str| LogEntry::new(Utc::now(), "PaymentService", LogLevel::Error, message);

    broker.fail_next_sends(3);
    let err = publisher.publish(&entry("lost")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Delivery { attempts: 3, .. }));
    assert!(!err.is_fatal());
    assert_eq!(broker.log_end_offset(0), 0);

    broker.fail_next_sends(2);
    let delivery = publisher.publish(&entry("kept")).await.unwrap();
    assert_eq!(delivery.offset, 0);
}

#[tokio::test]
async fn test_wrong_topic_is_a_delivery_error() {
    let broker = MemoryBroker::new("raw-logs", 1);
    let publisher = Publisher::new(broker.producer(RetryPolicy::default()), "missing-topic");
    let err = publisher
        .publish(&LogEntry::new(Utc::now(), "A", LogLevel::Info, "x"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing-topic"));
}

#[tokio::test]
async fn test_session_loss_rejoins_without_duplicates() {
    let broker = MemoryBroker::new("raw-logs", 3);
    publish_all(&broker, "DatabaseService", &numbered("before", 3)).await;

    let (sink, output) = OutputSink::capture();
    let running = spawn_subscriber(&broker, "g", sink);
    assert!(wait_until(Duration::from_secs(5), || output.lines().len() >= 3).await);

    broker.fail_next_session();
    publish_all(&broker, "DatabaseService", &numbered("after", 2)).await;
    assert!(wait_until(Duration::from_secs(5), || output.lines().len() >= 5).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = running.stop().await;

    assert_eq!(report.rejoins, 1);
    assert_eq!(report.rendered, 5);
    let lines = output.lines();
    let offsets: Vec<i64> = lines.iter().map(|l| position_of(l).offset).collect();
    assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
}
