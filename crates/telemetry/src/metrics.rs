//! Engine metrics.
//!
//! One [`EngineMetrics`] instance belongs to one engine and is shared with its
//! workers by `Arc`. Nothing here is process-global, so several engines can
//! run side by side (e.g. in one test binary) without mixing their numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge (can go up or down, never below zero).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(ms, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper_bound_ms, count)` pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Counters for one ingestion engine.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    // Producer side
    pub batches_enqueued: Counter,
    pub events_received: Counter,

    // Codec
    pub rows_decoded: Counter,
    pub rows_dropped: Counter,

    // Bulk loader
    pub flushes: Counter,
    pub rows_written: Counter,
    pub flush_failures: Counter,
    pub rows_lost: Counter,
    pub flush_latency_ms: Histogram,

    // Workers
    pub worker_connect_failures: Counter,
    pub live_workers: Gauge,

    pub queue_depth: Gauge,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            batches_enqueued: self.batches_enqueued.get(),
            events_received: self.events_received.get(),
            rows_decoded: self.rows_decoded.get(),
            rows_dropped: self.rows_dropped.get(),
            flushes: self.flushes.get(),
            rows_written: self.rows_written.get(),
            flush_failures: self.flush_failures.get(),
            rows_lost: self.rows_lost.get(),
            flush_latency_mean_ms: self.flush_latency_ms.mean(),
            flush_latency_max_ms: self.flush_latency_ms.max(),
            worker_connect_failures: self.worker_connect_failures.get(),
            live_workers: self.live_workers.get(),
            queue_depth: self.queue_depth.get(),
        }
    }
}

/// A snapshot of engine metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub batches_enqueued: u64,
    pub events_received: u64,
    pub rows_decoded: u64,
    pub rows_dropped: u64,
    pub flushes: u64,
    pub rows_written: u64,
    pub flush_failures: u64,
    pub rows_lost: u64,
    pub flush_latency_mean_ms: f64,
    pub flush_latency_max_ms: u64,
    pub worker_connect_failures: u64,
    pub live_workers: u64,
    pub queue_depth: u64,
}
