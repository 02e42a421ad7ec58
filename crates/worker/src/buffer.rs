//! Per-worker row accumulator.

use engine_core::LogRow;

/// Rows decoded by one worker and awaiting a bulk load.
///
/// Owned by exactly one worker, so no locking. Insertion order is kept and
/// becomes the order rows are streamed to storage.
#[derive(Debug, Default)]
pub struct WorkerBuffer {
    rows: Vec<LogRow>,
}

impl WorkerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, row: LogRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the buffer has reached `threshold` rows.
    pub fn should_flush(&self, threshold: usize) -> bool {
        self.rows.len() >= threshold
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    /// Takes every buffered row, leaving the buffer empty but keeping its allocation.
    pub fn drain(&mut self) -> Vec<LogRow> {
        self.rows.drain(..).collect()
    }

    /// Empties the buffer without returning rows.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
