//! Per-record handling and per-partition workers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::broker::{ConsumedRecord, OffsetMarker};
use crate::error::PipelineError;
use crate::observability::metrics;
use crate::record::codec;
use crate::subscriber::render::{render_line, RenderStyle};
use crate::subscriber::sink::OutputSink;

/// What happened to a dispatched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Decoded and written to the sink.
    Rendered,
    /// Malformed; dropped and marked consumed.
    Skipped,
    /// Decoded but the sink rejected the line. Still marked consumed.
    WriteFailed,
}

/// Running totals across every worker.
#[derive(Debug, Default)]
pub struct DispatchCounters {
    rendered: AtomicU64,
    malformed: AtomicU64,
}

impl DispatchCounters {
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Decodes, renders and marks records.
pub struct Dispatcher {
    sink: OutputSink,
    style: RenderStyle,
    marker: Arc<dyn OffsetMarker>,
    counters: Arc<DispatchCounters>,
}

impl Dispatcher {
    pub fn new(
        sink: OutputSink,
        style: RenderStyle,
        marker: Arc<dyn OffsetMarker>,
        counters: Arc<DispatchCounters>,
    ) -> Self {
        Self {
            sink,
            style,
            marker,
            counters,
        }
    }

    /// Handle one record: decode, render, mark.
    ///
    /// A malformed record is logged and marked so it is never redelivered;
    /// retrying it cannot succeed.
    pub fn dispatch(&self, record: &ConsumedRecord) -> DispatchOutcome {
        let outcome = match codec::decode(&record.payload) {
            Ok(entry) => {
                let line = render_line(&entry, record.position(), &self.style);
                match self.sink.write_line(&line) {
                    Ok(()) => {
                        self.counters.rendered.fetch_add(1, Ordering::Relaxed);
                        metrics::record_rendered(record.partition);
                        DispatchOutcome::Rendered
                    }
                    Err(e) => {
                        tracing::error!(
                            partition = record.partition,
                            offset = record.offset,
                            error = %PipelineError::Io(e),
                            "Failed to write rendered record"
                        );
                        DispatchOutcome::WriteFailed
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Skipping malformed record"
                );
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                metrics::record_malformed();
                DispatchOutcome::Skipped
            }
        };

        if let Err(e) = self.marker.mark(&record.topic, record.partition, record.offset) {
            tracing::warn!(
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "Failed to mark record processed"
            );
        }

        outcome
    }
}

/// One worker task per claimed partition, each fed through a bounded queue.
pub struct PartitionWorkers {
    dispatcher: Arc<Dispatcher>,
    queue_depth: usize,
    queues: HashMap<i32, mpsc::Sender<ConsumedRecord>>,
    tasks: JoinSet<()>,
}

impl PartitionWorkers {
    pub fn new(dispatcher: Dispatcher, queue_depth: usize) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            queue_depth: queue_depth.max(1),
            queues: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Hand a pulled record to its partition's worker, starting the worker
    /// on first use. Waits while the worker's queue is full.
    pub async fn dispatch(&mut self, record: ConsumedRecord) {
        let partition = record.partition;
        let queue = match self.queues.get(&partition) {
            Some(queue) => queue.clone(),
            None => {
                let queue = self.spawn_worker(partition);
                self.queues.insert(partition, queue.clone());
                queue
            }
        };

        if let Err(mpsc::error::SendError(record)) = queue.send(record).await {
            tracing::error!(
                partition,
                offset = record.offset,
                "Partition worker stopped, record left unmarked"
            );
            self.queues.remove(&partition);
        }
    }

    fn spawn_worker(&mut self, partition: i32) -> mpsc::Sender<ConsumedRecord> {
        let (tx, mut rx) = mpsc::channel::<ConsumedRecord>(self.queue_depth);
        let dispatcher = self.dispatcher.clone();

        self.tasks.spawn(async move {
            tracing::debug!(partition, "Partition worker started");
            while let Some(record) = rx.recv().await {
                dispatcher.dispatch(&record);
            }
            tracing::debug!(partition, "Partition worker finished");
        });
        tx
    }

    /// Close every queue and wait for workers to finish what they hold.
    /// Workers still running after `grace` are aborted; returns `false` then.
    pub async fn drain(mut self, grace: Duration) -> bool {
        tracing::debug!(partitions = self.queues.len(), "Draining partition workers");
        self.queues.clear();

        let finished = tokio::time::timeout(grace, async {
            while let Some(joined) = self.tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Partition worker panicked");
                }
            }
        })
        .await;

        match finished {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.tasks.len(),
                    grace_ms = grace.as_millis() as u64,
                    "Drain grace period elapsed, aborting partition workers"
                );
                self.tasks.abort_all();
                false
            }
        }
    }
}
