//! Engine configuration.

use std::time::Duration;

use engine_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunables for one ingestion engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of workers, each with its own storage connection
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Maximum batches waiting in the queue before producers block
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Events per batch on the producer side
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Buffered rows per worker that trigger a bulk load
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// Required embedding length
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    /// Connection attempts per worker before it gives up
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Fixed pause between connection attempts
    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_queue_capacity() -> usize {
    100
}

fn default_batch_size() -> usize {
    2000
}

fn default_flush_threshold() -> usize {
    5000
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_connect_retries() -> u32 {
    5
}

fn default_connect_backoff_ms() -> u64 {
    2000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
            flush_threshold: default_flush_threshold(),
            embedding_dimension: default_embedding_dimension(),
            connect_retries: default_connect_retries(),
            connect_backoff_ms: default_connect_backoff_ms(),
        }
    }
}

impl EngineConfig {
    pub fn with_worker_count(mut self, n: usize) -> Self {
        self.worker_count = n;
        self
    }

    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn with_flush_threshold(mut self, n: usize) -> Self {
        self.flush_threshold = n;
        self
    }

    pub fn with_embedding_dimension(mut self, n: usize) -> Self {
        self.embedding_dimension = n;
        self
    }

    pub fn with_connect_policy(mut self, retries: u32, backoff: Duration) -> Self {
        self.connect_retries = retries;
        self.connect_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    /// Applies the bare `WORKER_COUNT`, `QUEUE_CAPACITY`, `BATCH_SIZE`,
    /// `FLUSH_THRESHOLD` and `EMBEDDING_DIMENSION` variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let fields: [(&str, &mut usize); 5] = [
            ("WORKER_COUNT", &mut self.worker_count),
            ("QUEUE_CAPACITY", &mut self.queue_capacity),
            ("BATCH_SIZE", &mut self.batch_size),
            ("FLUSH_THRESHOLD", &mut self.flush_threshold),
            ("EMBEDDING_DIMENSION", &mut self.embedding_dimension),
        ];

        for (key, slot) in fields {
            if let Some(raw) = lookup(key) {
                *slot = raw.trim().parse().map_err(|_| {
                    Error::config(format!("{} must be an integer, got '{}'", key, raw))
                })?;
            }
        }
        Ok(())
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("worker_count", self.worker_count),
            ("queue_capacity", self.queue_capacity),
            ("batch_size", self.batch_size),
            ("flush_threshold", self.flush_threshold),
            ("embedding_dimension", self.embedding_dimension),
        ];

        for (name, value) in checks {
            if value == 0 {
                return Err(Error::config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }
}
