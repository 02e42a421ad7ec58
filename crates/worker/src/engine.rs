//! Ingestion engine: bounded queue plus worker pool.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use engine_core::{Error, Result, StorageBackend};
use serde::Serialize;
use telemetry::{EngineMetrics, MetricsSnapshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::queue::{Batch, QueueItem};
use crate::worker_loop::{WorkerLoop, WorkerReport, WorkerState};

/// Outcome of a full engine run, returned by [`IngestionEngine::stop`].
#[derive(Debug, Clone, Serialize)]
pub struct EngineReport {
    pub workers: Vec<WorkerReport>,
    pub metrics: MetricsSnapshot,
}

impl EngineReport {
    pub fn rows_written(&self) -> u64 {
        self.workers.iter().map(|w| w.rows_written).sum()
    }

    pub fn rows_dropped(&self) -> u64 {
        self.workers.iter().map(|w| w.rows_dropped).sum()
    }

    /// Every event accepted or offered that never reached storage: rolled-back
    /// flushes, batches stranded in the queue, and batches refused once no
    /// worker was left.
    pub fn rows_lost(&self) -> u64 {
        self.metrics.rows_lost
    }

    /// Workers that never acquired a connection.
    pub fn failed_workers(&self) -> usize {
        self.workers.iter().filter(|w| !w.connected).count()
    }
}

/// Accepts batches of serialized events and loads them through `N` workers.
///
/// Usage is `new` → `start` → any number of `ingest_batch` → `stop`.
/// Errors inside the pipeline never reach the caller; they are logged and
/// counted in [`EngineMetrics`].
pub struct IngestionEngine {
    config: EngineConfig,
    backend: Arc<dyn StorageBackend>,
    metrics: Arc<EngineMetrics>,
    sender: Sender<QueueItem>,
    // Handed to the workers on start; after that only workers hold receivers,
    // so the queue closes once every worker has exited.
    receiver: Option<Receiver<QueueItem>>,
    handles: Vec<JoinHandle<WorkerReport>>,
}

impl IngestionEngine {
    pub fn new(config: EngineConfig, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = async_channel::bounded(config.queue_capacity);

        Ok(Self {
            config,
            backend,
            metrics: Arc::new(EngineMetrics::new()),
            sender,
            receiver: Some(receiver),
            handles: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    pub fn is_started(&self) -> bool {
        self.receiver.is_none()
    }

    /// Spawns the worker pool on the current Tokio runtime.
    ///
    /// A second call is rejected rather than spawning another pool.
    pub fn start(&mut self) -> Result<()> {
        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| Error::internal("ingestion engine already started"))?;

        let remaining = Arc::new(AtomicUsize::new(self.config.worker_count));
        for worker_id in 0..self.config.worker_count {
            let worker = WorkerLoop::new(
                worker_id,
                receiver.clone(),
                remaining.clone(),
                self.backend.clone(),
                &self.config,
                self.metrics.clone(),
            );
            self.handles.push(tokio::spawn(worker.run()));
        }

        info!(
            workers = self.config.worker_count,
            queue_capacity = self.config.queue_capacity,
            flush_threshold = self.config.flush_threshold,
            backend = self.backend.name(),
            "Ingestion engine started"
        );
        Ok(())
    }

    /// Enqueues one batch, waiting while the queue is full.
    ///
    /// If every worker has already exited the batch cannot be delivered; it is
    /// logged and counted as lost instead of blocking forever.
    pub async fn ingest_batch(&self, batch: impl Into<Batch>) {
        let batch = batch.into();
        let events = batch.len() as u64;

        match self.sender.send(QueueItem::Batch(batch)).await {
            Ok(()) => {
                self.metrics.batches_enqueued.inc();
                self.metrics.events_received.inc_by(events);
                self.metrics.queue_depth.set(self.sender.len() as u64);
            }
            Err(_) => {
                self.metrics.rows_lost.inc_by(events);
                error!(events = events, "No live workers, batch discarded");
            }
        }
    }

    /// Sends one shutdown sentinel per worker and waits for all of them to exit.
    pub async fn stop(self) -> EngineReport {
        let workers = self.handles.len();

        for _ in 0..workers {
            // Fails only once every worker is gone, and then nobody needs it.
            if self.sender.send(QueueItem::Shutdown).await.is_err() {
                break;
            }
        }

        let mut reports = Vec::with_capacity(workers);
        for (worker_id, handle) in self.handles.into_iter().enumerate() {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(worker_id = worker_id, error = %e, "Worker task panicked");
                }
            }
        }

        let terminated = reports
            .iter()
            .filter(|r| r.final_state == WorkerState::Terminated)
            .count();
        if terminated < workers {
            warn!(
                expected = workers,
                terminated = terminated,
                "Not every worker reported termination"
            );
        }

        let report = EngineReport {
            workers: reports,
            metrics: self.metrics.snapshot(),
        };

        info!(
            workers = workers,
            failed_workers = report.failed_workers(),
            rows_written = report.rows_written(),
            rows_dropped = report.rows_dropped(),
            rows_lost = report.rows_lost(),
            "Ingestion engine stopped"
        );
        report
    }
}
