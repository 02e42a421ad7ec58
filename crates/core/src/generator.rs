//! Synthetic agent log generator for benchmarks and tests.
//!
//! Output is deterministic so that runs are comparable.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::events::{Level, TelemetryEvent};

/// Number of distinct agent ids cycled through.
pub const AGENT_POOL: usize = 50;

/// Builds the `i`-th synthetic event of a batch.
pub fn synthetic_event(i: usize, dimension: usize, base: DateTime<Utc>) -> TelemetryEvent {
    let mut payload = Map::new();
    payload.insert("tokens".into(), Value::from(10 + (i * 17) % 91));
    payload.insert("model".into(), Value::from("gpt-4-turbo"));

    // Two-decimal values keep serialized batches small
    let embedding = (0..dimension)
        .map(|j| ((i * 7 + j * 13) % 100) as f32 / 100.0)
        .collect();

    TelemetryEvent {
        timestamp: base + chrono::Duration::seconds(i as i64),
        agent_id: format!("agent_{}", i % AGENT_POOL + 1),
        level: Level::Info,
        action: "reasoning_step".into(),
        payload,
        embedding,
    }
}

/// Generates `size` serialized events with consecutive one-second timestamps.
pub fn generate_batch(size: usize, dimension: usize, base: DateTime<Utc>) -> Vec<String> {
    (0..size)
        .map(|i| synthetic_event(i, dimension, base).to_wire())
        .collect()
}
