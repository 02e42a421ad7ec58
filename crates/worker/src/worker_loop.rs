//! Worker loop: connect, decode and buffer batches, flush, drain on shutdown.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use engine_core::{EventCodec, StorageBackend, StorageConnection};
use serde::Serialize;
use telemetry::EngineMetrics;
use tracing::{debug, error, info, warn};

use crate::buffer::WorkerBuffer;
use crate::config::EngineConfig;
use crate::loader::BulkLoader;
use crate::queue::{Batch, QueueItem};

/// Lifecycle of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Connecting,
    Running,
    Draining,
    Terminated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// What one worker did over its lifetime, returned when it exits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub final_state: WorkerState,
    /// False when the worker gave up in `Connecting` and processed nothing
    pub connected: bool,
    pub batches: u64,
    pub rows_decoded: u64,
    pub rows_dropped: u64,
    pub flushes: u64,
    pub rows_written: u64,
    pub flush_failures: u64,
    pub rows_lost: u64,
}

impl WorkerReport {
    fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            final_state: WorkerState::Connecting,
            connected: false,
            batches: 0,
            rows_decoded: 0,
            rows_dropped: 0,
            flushes: 0,
            rows_written: 0,
            flush_failures: 0,
            rows_lost: 0,
        }
    }
}

/// One worker: owns its connection and buffer, shares only the queue.
pub struct WorkerLoop {
    id: usize,
    queue: Receiver<QueueItem>,
    // Workers of this pool that have not exited yet, shared across the pool
    remaining: Arc<AtomicUsize>,
    backend: Arc<dyn StorageBackend>,
    codec: EventCodec,
    buffer: WorkerBuffer,
    loader: BulkLoader,
    flush_threshold: usize,
    connect_attempts: u32,
    connect_backoff: Duration,
    metrics: Arc<EngineMetrics>,
    state: WorkerState,
    report: WorkerReport,
}

impl WorkerLoop {
    pub fn new(
        id: usize,
        queue: Receiver<QueueItem>,
        remaining: Arc<AtomicUsize>,
        backend: Arc<dyn StorageBackend>,
        config: &EngineConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            id,
            queue,
            remaining,
            backend,
            codec: EventCodec::new(config.embedding_dimension),
            buffer: WorkerBuffer::with_capacity(config.flush_threshold),
            loader: BulkLoader::new(id, metrics.clone()),
            flush_threshold: config.flush_threshold,
            connect_attempts: config.connect_retries.max(1),
            connect_backoff: config.connect_backoff(),
            metrics,
            state: WorkerState::Connecting,
            report: WorkerReport::new(id),
        }
    }

    /// Runs the worker to completion.
    ///
    /// Returns once a shutdown sentinel has been consumed and the buffer
    /// drained, or immediately if no connection could be acquired. The last
    /// worker of a pool to exit closes the queue and counts whatever is still
    /// in it as lost.
    pub async fn run(mut self) -> WorkerReport {
        let Some(mut conn) = self.connect().await else {
            self.transition(WorkerState::Terminated);
            self.release_queue();
            return self.finish();
        };

        self.report.connected = true;
        self.metrics.live_workers.inc();
        self.transition(WorkerState::Running);
        info!(
            worker_id = self.id,
            backend = self.backend.name(),
            "Worker started"
        );

        loop {
            let item = self.queue.recv().await;
            self.metrics.queue_depth.set(self.queue.len() as u64);

            match item {
                Ok(QueueItem::Batch(batch)) => {
                    self.process_batch(batch);
                    if self.buffer.should_flush(self.flush_threshold) {
                        self.flush(conn.as_mut()).await;
                    }
                }
                Ok(QueueItem::Shutdown) => break,
                Err(_) => {
                    // Every sender is gone, so no sentinel can arrive.
                    warn!(worker_id = self.id, "Queue closed without shutdown sentinel");
                    break;
                }
            }
        }

        self.transition(WorkerState::Draining);
        if !self.buffer.is_empty() {
            self.flush(conn.as_mut()).await;
        }

        self.transition(WorkerState::Terminated);
        self.metrics.live_workers.dec();
        self.release_queue();
        info!(
            worker_id = self.id,
            batches = self.report.batches,
            rows_written = self.report.rows_written,
            rows_dropped = self.report.rows_dropped,
            rows_lost = self.report.rows_lost,
            "Worker stopped"
        );
        self.finish()
    }

    async fn connect(&mut self) -> Option<Box<dyn StorageConnection>> {
        for attempt in 1..=self.connect_attempts {
            match self.backend.connect(self.id).await {
                Ok(conn) => return Some(conn),
                Err(e) if attempt < self.connect_attempts => {
                    warn!(
                        worker_id = self.id,
                        attempt = attempt,
                        backoff_ms = %self.connect_backoff.as_millis(),
                        error = %e,
                        "Storage connection failed, retrying"
                    );
                    tokio::time::sleep(self.connect_backoff).await;
                }
                Err(e) => {
                    error!(
                        worker_id = self.id,
                        attempts = self.connect_attempts,
                        error = %e,
                        "Storage unreachable, worker exiting without processing"
                    );
                }
            }
        }

        self.metrics.worker_connect_failures.inc();
        None
    }

    fn process_batch(&mut self, batch: Batch) {
        self.report.batches += 1;

        for (index, raw) in batch.into_events().into_iter().enumerate() {
            match self.codec.decode(&raw) {
                Ok(row) => {
                    self.buffer.append(row);
                    self.report.rows_decoded += 1;
                    self.metrics.rows_decoded.inc();
                }
                Err(e) => {
                    self.report.rows_dropped += 1;
                    self.metrics.rows_dropped.inc();
                    warn!(
                        worker_id = self.id,
                        index = index,
                        error = %e,
                        "Dropping malformed event"
                    );
                }
            }
        }
    }

    /// Flushes the buffer and clears it whatever the outcome.
    async fn flush(&mut self, conn: &mut dyn StorageConnection) {
        let pending = self.buffer.len() as u64;

        match self.loader.flush(conn, self.buffer.rows()).await {
            Ok(written) => {
                self.report.flushes += 1;
                self.report.rows_written += written;
            }
            Err(_) => {
                self.report.flush_failures += 1;
                self.report.rows_lost += pending;
            }
        }

        self.buffer.clear();
    }

    fn release_queue(&mut self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        // Later sends fail and are counted by the producer.
        self.queue.close();

        let mut stranded = 0u64;
        while let Ok(item) = self.queue.try_recv() {
            if let QueueItem::Batch(batch) = item {
                stranded += batch.len() as u64;
            }
        }
        self.metrics.queue_depth.set(0);

        if stranded > 0 {
            self.report.rows_lost += stranded;
            self.metrics.rows_lost.inc_by(stranded);
            error!(
                worker_id = self.id,
                events = stranded,
                "No workers left, queued events discarded"
            );
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker_id = self.id, from = %self.state, to = %next, "Worker state change");
        self.state = next;
    }

    fn finish(mut self) -> WorkerReport {
        self.report.final_state = self.state;
        self.report
    }
}
