//! Startup orchestration for each process role.
//!
//! # Responsibilities
//! - Initialise logging and the optional metrics endpoint
//! - Build the broker client and confirm the broker is reachable
//! - Wire OS signals into the shutdown coordinator
//! - Run the role until shutdown, then release the client
//!
//! # Design Decisions
//! - Fail fast: connection and config errors end startup
//! - Once running, only a signal stops the process

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::join_all;

use crate::broker::memory::MemoryBroker;
use crate::broker::MessageProducer;
use crate::config::loader::ConfigError;
use crate::config::validation::ValidationError;
use crate::config::{ObservabilityConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::generator::{choose_application, seeded_rng, Generator};
use crate::lifecycle::signals::spawn_signal_listener;
use crate::lifecycle::Shutdown;
use crate::observability::{logging, metrics};
use crate::publisher::{run_producer, ProducerReport, Publisher};
use crate::resilience::RetryPolicy;
use crate::subscriber::{OutputSink, Subscriber, SubscriberOptions, SubscriberReport};

/// Install logging and, when enabled, the Prometheus endpoint.
pub fn init_observability(config: &ObservabilityConfig) {
    if !logging::init_logging(config) {
        tracing::debug!("Global subscriber already installed");
    }

    if config.metrics_enabled {
        match config.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }
}

fn no_applications() -> PipelineError {
    PipelineError::Config(ConfigError::Validation(vec![ValidationError::Empty {
        field: "generator.applications",
    }]))
}

/// Run the publishing loop and flush the producer before returning.
async fn publish_until_shutdown<P: MessageProducer>(
    publisher: Publisher<P>,
    mut generator: Generator<rand::rngs::StdRng>,
    shutdown: &Shutdown,
) -> ProducerReport {
    let report = run_producer(&publisher, &mut generator, shutdown.subscribe()).await;
    publisher.close().await;
    report
}

/// Run a producer process against Kafka.
///
/// Publishes as `application` when given, otherwise as a configured
/// application picked at random.
pub async fn start_producer(config: PipelineConfig, application: Option<String>) -> Result<ProducerReport> {
    init_observability(&config.observability);

    let generator_config = &config.generator;
    let mut rng = seeded_rng(generator_config.seed);
    let application = match application {
        Some(name) => name,
        None => choose_application(&mut rng, &generator_config.applications)
            .map(str::to_string)
            .ok_or_else(no_applications)?,
    };
    let generator = Generator::new(
        application,
        rng,
        generator_config.min_interval_secs..=generator_config.max_interval_secs,
    );

    let producer = connect_producer(&config).await?;
    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());

    let publisher = Publisher::new(producer, config.broker.topic.clone());
    let report = publish_until_shutdown(publisher, generator, &shutdown).await;
    tracing::info!("Shutdown complete");
    Ok(report)
}

#[cfg(feature = "kafka")]
async fn connect_producer(config: &PipelineConfig) -> Result<crate::broker::kafka::KafkaProducer> {
    crate::broker::kafka::KafkaProducer::connect(&config.broker, &config.producer).await
}

#[cfg(not(feature = "kafka"))]
async fn connect_producer(_config: &PipelineConfig) -> Result<crate::broker::memory::MemoryProducer> {
    Err(PipelineError::Connection(crate::broker::BrokerError::Unsupported(
        "built without the `kafka` feature".into(),
    )))
}

/// Run a subscriber process against Kafka.
pub async fn start_consumer(
    mut config: PipelineConfig,
    group_id: Option<String>,
    no_color: bool,
) -> Result<SubscriberReport> {
    init_observability(&config.observability);

    if let Some(group_id) = group_id {
        config.consumer.group_id = group_id;
    }
    if no_color {
        config.consumer.color = false;
    }

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());

    let report = consume_until_shutdown(&config, &shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(report)
}

#[cfg(feature = "kafka")]
async fn consume_until_shutdown(config: &PipelineConfig, shutdown: &Shutdown) -> Result<SubscriberReport> {
    let group = crate::broker::kafka::KafkaConsumerGroup::connect(&config.broker, &config.consumer).await?;
    let subscriber = Subscriber::new(group, OutputSink::stdout(), SubscriberOptions::from(&config.consumer));
    Ok(subscriber.run(shutdown.subscribe()).await)
}

#[cfg(not(feature = "kafka"))]
async fn consume_until_shutdown(_config: &PipelineConfig, _shutdown: &Shutdown) -> Result<SubscriberReport> {
    Err(PipelineError::Connection(crate::broker::BrokerError::Unsupported(
        "built without the `kafka` feature".into(),
    )))
}

/// Totals of a demo run.
#[derive(Debug, Clone, Default)]
pub struct DemoReport {
    pub producers: Vec<(String, ProducerReport)>,
    pub subscriber: SubscriberReport,
}

/// Run `apps` producers and one subscriber in this process over the
/// in-process broker. Output goes to stdout.
pub async fn start_demo(config: PipelineConfig, apps: usize) -> Result<DemoReport> {
    init_observability(&config.observability);
    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());

    let report = run_demo(&config, apps, OutputSink::stdout(), &shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(report)
}

/// Demo body, separated from process wiring so it can run under test.
pub async fn run_demo(
    config: &PipelineConfig,
    apps: usize,
    sink: OutputSink,
    shutdown: &Shutdown,
) -> Result<DemoReport> {
    let names: Vec<String> = config
        .generator
        .applications
        .iter()
        .take(apps.max(1))
        .cloned()
        .collect();
    if names.is_empty() {
        return Err(no_applications());
    }

    let broker = MemoryBroker::new(config.broker.topic.clone(), config.broker.partitions);
    let retry = RetryPolicy::from_config(&config.producer);
    tracing::info!(
        topic = %broker.topic(),
        partitions = broker.partition_count(),
        applications = ?names,
        "Starting in-process demo"
    );

    let generator_config = &config.generator;
    let producers = names.iter().enumerate().map(|(index, name)| {
        let seed = generator_config.seed.map(|seed| seed.wrapping_add(index as u64));
        let generator = Generator::new(
            name.clone(),
            seeded_rng(seed),
            generator_config.min_interval_secs..=generator_config.max_interval_secs,
        );
        let publisher = Publisher::new(broker.producer(retry), broker.topic().to_string());
        async move {
            let report = publish_until_shutdown(publisher, generator, shutdown).await;
            (name.clone(), report)
        }
    });

    let subscriber = Subscriber::new(
        broker.consumer_group(config.consumer.group_id.clone()),
        sink,
        SubscriberOptions::from(&config.consumer),
    );

    let (producers, subscriber) = tokio::join!(join_all(producers), subscriber.run(shutdown.subscribe()));
    Ok(DemoReport {
        producers,
        subscriber,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn demo_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.generator.min_interval_secs = 1;
        config.generator.max_interval_secs = 1;
        config.generator.seed = Some(11);
        config.consumer.color = false;
        config.consumer.utc = true;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_renders_every_published_entry() {
        let config = demo_config();
        let (sink, output) = OutputSink::capture();
        let shutdown = Shutdown::new();

        let stop = async {
            tokio::time::sleep(Duration::from_millis(3_500)).await;
            shutdown.trigger();
        };
        let (report, ()) = tokio::join!(run_demo(&config, 2, sink, &shutdown), stop);
        let report = report.unwrap();

        let names: Vec<&str> = report.producers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["userService", "DatabaseService"]);
        let published: u64 = report.producers.iter().map(|(_, r)| r.published).sum();
        assert_eq!(published, 6);
        assert_eq!(report.subscriber.rendered, published);
        assert_eq!(output.lines().len(), 6);
    }

    #[tokio::test]
    async fn test_demo_without_applications_is_a_config_error() {
        let mut config = demo_config();
        config.generator.applications.clear();
        let (sink, _output) = OutputSink::capture();
        let err = run_demo(&config, 2, sink, &Shutdown::new()).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
