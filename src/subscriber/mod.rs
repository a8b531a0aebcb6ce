//! Consumer-group subscriber.
//!
//! # States
//! - Joining: group session not yet established
//! - Ready: session established, pulling records
//! - Draining: shutdown requested, finishing records already pulled
//! - Stopped: workers finished, session closed
//!
//! # State Transitions
//! ```text
//! Joining → Ready: broker client reports the session established
//! Ready → Draining: shutdown signal
//! Ready → Joining: session lost or ended by the broker (after backoff)
//! Draining → Stopped: workers drained (bounded grace), session closed
//! ```
//!
//! # Design Decisions
//! - The pull loop only routes records; one worker per partition renders
//! - Records already pulled are always rendered, even during shutdown
//! - Session failures never stop the process; the subscriber rejoins

pub mod dispatcher;
pub mod render;
pub mod sink;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::broker::{BrokerError, ConsumerGroup};
use crate::config::ConsumerConfig;
use crate::error::PipelineError;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::Backoff;

pub use dispatcher::{DispatchCounters, DispatchOutcome, Dispatcher, PartitionWorkers};
pub use render::{level_color, render_line, Color, RenderStyle};
pub use sink::{CapturedOutput, OutputSink};

/// Lifecycle state of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Joining,
    Ready,
    Draining,
    Stopped,
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriberState::Joining => "joining",
            SubscriberState::Ready => "ready",
            SubscriberState::Draining => "draining",
            SubscriberState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Totals for a subscriber run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberReport {
    pub rendered: u64,
    pub malformed: u64,
    pub rejoins: u64,
}

/// Subscriber settings derived from configuration.
#[derive(Debug, Clone)]
pub struct SubscriberOptions {
    pub style: RenderStyle,
    pub queue_depth: usize,
    pub drain_grace: Duration,
    pub rejoin_base_delay: Duration,
    pub rejoin_max_delay: Duration,
}

impl From<&ConsumerConfig> for SubscriberOptions {
    fn from(config: &ConsumerConfig) -> Self {
        Self {
            style: RenderStyle {
                color: config.color,
                utc: config.utc,
            },
            queue_depth: config.queue_depth,
            drain_grace: Duration::from_millis(config.drain_grace_ms),
            rejoin_base_delay: Duration::from_millis(config.rejoin_base_delay_ms),
            rejoin_max_delay: Duration::from_millis(config.rejoin_max_delay_ms),
        }
    }
}

impl Default for SubscriberOptions {
    fn default() -> Self {
        Self::from(&ConsumerConfig::default())
    }
}

/// How a session's pull loop ended.
enum SessionEnd {
    Shutdown,
    Lost(BrokerError),
    Ended,
}

/// Joins a consumer group and renders every record it is assigned.
pub struct Subscriber<G> {
    group: G,
    sink: OutputSink,
    options: SubscriberOptions,
    state: watch::Sender<SubscriberState>,
}

impl<G: ConsumerGroup> Subscriber<G> {
    pub fn new(group: G, sink: OutputSink, options: SubscriberOptions) -> Self {
        let (state, _) = watch::channel(SubscriberState::Joining);
        Self {
            group,
            sink,
            options,
            state,
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SubscriberState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(
                group_id = %self.group.group_id(),
                from = %previous,
                to = %next,
                "Subscriber state changed"
            );
        }
    }

    /// Run until shutdown, rejoining the group whenever the session breaks.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> SubscriberReport {
        let counters = Arc::new(DispatchCounters::default());
        let mut backoff = Backoff::new(self.options.rejoin_base_delay, self.options.rejoin_max_delay);
        let mut rejoins = 0u64;
        let mut announced = false;

        'membership: loop {
            self.transition(SubscriberState::Joining);

            let joined = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break 'membership,
                joined = self.group.join() => joined,
            };

            let mut session = match joined {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(
                        group_id = %self.group.group_id(),
                        error = %PipelineError::Session(e),
                        "Failed to join consumer group"
                    );
                    if !self.pause(&mut backoff, &mut shutdown).await {
                        break 'membership;
                    }
                    continue 'membership;
                }
            };

            backoff.reset();
            self.transition(SubscriberState::Ready);
            if !announced {
                tracing::info!(group_id = %self.group.group_id(), "Consumer group started");
                announced = true;
            }

            let dispatcher = Dispatcher::new(
                self.sink.clone(),
                self.options.style,
                session.marker(),
                counters.clone(),
            );
            let mut workers = PartitionWorkers::new(dispatcher, self.options.queue_depth);

            let end = loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break SessionEnd::Shutdown,
                    next = session.next_record() => match next {
                        Some(Ok(record)) => workers.dispatch(record).await,
                        Some(Err(e)) => break SessionEnd::Lost(e),
                        None => break SessionEnd::Ended,
                    },
                }
            };

            if matches!(end, SessionEnd::Shutdown) {
                self.transition(SubscriberState::Draining);
            }

            workers.drain(self.options.drain_grace).await;
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "Failed to close group session cleanly");
            }

            match end {
                SessionEnd::Shutdown => break 'membership,
                SessionEnd::Lost(e) => {
                    tracing::error!(
                        group_id = %self.group.group_id(),
                        error = %PipelineError::Session(e),
                        "Consumer group session broken, rejoining"
                    );
                }
                SessionEnd::Ended => {
                    tracing::info!(group_id = %self.group.group_id(), "Group session ended, rejoining");
                }
            }

            rejoins += 1;
            metrics::record_rejoin();
            if !self.pause(&mut backoff, &mut shutdown).await {
                break 'membership;
            }
        }

        self.transition(SubscriberState::Stopped);

        let report = SubscriberReport {
            rendered: counters.rendered(),
            malformed: counters.malformed(),
            rejoins,
        };
        tracing::info!(
            group_id = %self.group.group_id(),
            rendered = report.rendered,
            malformed = report.malformed,
            rejoins = report.rejoins,
            "Subscriber stopped"
        );
        report
    }

    /// Sleep before rejoining. Returns `false` if shutdown arrived first.
    async fn pause(&self, backoff: &mut Backoff, shutdown: &mut ShutdownSignal) -> bool {
        let delay = backoff.next_delay();
        tracing::debug!(
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "Waiting before rejoin"
        );
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
