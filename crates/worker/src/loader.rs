//! Bulk loader: hands a worker's buffered rows to storage as one commit.

use std::sync::Arc;
use std::time::Instant;

use engine_core::{LogRow, Result, StorageConnection};
use telemetry::EngineMetrics;
use tracing::{debug, error};

/// Flushes row slices through a worker's connection and records the outcome.
///
/// There is no retry: a failed flush is rolled back by the connection and
/// its rows are counted as lost.
pub struct BulkLoader {
    worker_id: usize,
    metrics: Arc<EngineMetrics>,
}

impl BulkLoader {
    pub fn new(worker_id: usize, metrics: Arc<EngineMetrics>) -> Self {
        Self { worker_id, metrics }
    }

    /// Streams `rows` and commits them as one unit.
    ///
    /// An empty slice returns `Ok(0)` without touching storage.
    pub async fn flush(&self, conn: &mut dyn StorageConnection, rows: &[LogRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let result = conn.copy_rows(rows).await;
        let elapsed = start.elapsed();

        match result {
            Ok(committed) => {
                self.metrics.flushes.inc();
                self.metrics.rows_written.inc_by(committed);
                self.metrics
                    .flush_latency_ms
                    .observe(elapsed.as_millis() as u64);

                debug!(
                    worker_id = self.worker_id,
                    rows = committed,
                    latency_ms = %elapsed.as_millis(),
                    "Flushed buffer"
                );
                Ok(committed)
            }
            Err(e) => {
                self.metrics.flush_failures.inc();
                self.metrics.rows_lost.inc_by(rows.len() as u64);

                error!(
                    worker_id = self.worker_id,
                    rows = rows.len(),
                    error = %e,
                    "Bulk load failed, rows dropped"
                );
                Err(e)
            }
        }
    }
}
