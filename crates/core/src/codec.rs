//! Event codec: one serialized event in, one storage row out.
//!
//! Decoding is pure. A failure rejects only the event at hand; the caller
//! logs it and moves on to the next entry in the batch.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::Value;
use validator::Validate;

use crate::error::DecodeError;
use crate::events::{Level, LogRow, TelemetryEvent, WireEvent};

/// Decodes serialized events for a table whose embedding column has a fixed dimension.
#[derive(Debug, Clone, Copy)]
pub struct EventCodec {
    dimension: usize,
}

impl EventCodec {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Parses a serialized event into a validated [`TelemetryEvent`].
    pub fn parse(&self, raw: &str) -> Result<TelemetryEvent, DecodeError> {
        let wire: WireEvent =
            serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let ts = wire.ts.ok_or(DecodeError::MissingField("ts"))?;
        let agent_id = wire.agent_id.ok_or(DecodeError::MissingField("agent_id"))?;
        let level = wire.level.ok_or(DecodeError::MissingField("level"))?;
        let action = wire.action.ok_or(DecodeError::MissingField("action"))?;
        let payload = wire.payload.ok_or(DecodeError::MissingField("payload"))?;
        let embedding = wire.embedding.ok_or(DecodeError::MissingField("embedding"))?;

        let payload = match payload {
            Value::Object(map) => map,
            _ => return Err(DecodeError::PayloadNotObject),
        };

        if embedding.len() != self.dimension {
            return Err(DecodeError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        // Values past f32 range deserialize as infinity, which pgvector rejects.
        if let Some(index) = embedding.iter().position(|v| !v.is_finite()) {
            return Err(DecodeError::InvalidField(format!(
                "embedding[{}] is not a finite f32",
                index
            )));
        }

        // NUL is rejected by both COPY text format and jsonb.
        if agent_id.contains('\0') {
            return Err(DecodeError::InvalidField("agent_id contains NUL".into()));
        }
        if action.contains('\0') {
            return Err(DecodeError::InvalidField("action contains NUL".into()));
        }
        if payload.iter().any(|(k, v)| k.contains('\0') || contains_nul(v)) {
            return Err(DecodeError::InvalidField("payload contains NUL".into()));
        }

        let event = TelemetryEvent {
            timestamp: parse_epoch_seconds(&ts)?,
            agent_id,
            level: level.parse::<Level>()?,
            action,
            payload,
            embedding,
        };

        event
            .validate()
            .map_err(|e| DecodeError::InvalidField(e.to_string()))?;

        Ok(event)
    }

    /// Decodes a serialized event straight into a storage row.
    pub fn decode(&self, raw: &str) -> Result<LogRow, DecodeError> {
        self.parse(raw).map(to_row)
    }
}

/// Converts a validated event into its row form.
pub fn to_row(event: TelemetryEvent) -> LogRow {
    LogRow {
        timestamp: event.timestamp,
        // Map<String, Value> serialization cannot fail
        payload: Value::Object(event.payload).to_string(),
        embedding: vector_literal(&event.embedding),
        agent_id: event.agent_id,
        level: event.level,
        action: event.action,
    }
}

/// Formats an embedding as a pgvector text literal, e.g. `[0.1,0.25,1]`.
pub fn vector_literal(values: &[f32]) -> String {
    let mut out = String::with_capacity(values.len() * 6 + 2);
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Writing to a String never fails
        let _ = write!(out, "{}", v);
    }
    out.push(']');
    out
}

fn contains_nul(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains('\0'),
        Value::Array(items) => items.iter().any(contains_nul),
        Value::Object(map) => map.iter().any(|(k, v)| k.contains('\0') || contains_nul(v)),
        _ => false,
    }
}

/// Interprets a JSON number as seconds since the Unix epoch.
fn parse_epoch_seconds(ts: &Value) -> Result<DateTime<Utc>, DecodeError> {
    let secs = ts
        .as_f64()
        .ok_or_else(|| DecodeError::InvalidTimestamp(format!("expected epoch seconds, got {}", ts)))?;

    if !secs.is_finite() {
        return Err(DecodeError::InvalidTimestamp(format!("{}", secs)));
    }

    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
    let (whole, nanos) = if nanos >= 1_000_000_000 {
        (whole + 1.0, 0)
    } else {
        (whole, nanos)
    };

    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return Err(DecodeError::InvalidTimestamp(format!("{} out of range", secs)));
    }

    DateTime::from_timestamp(whole as i64, nanos)
        .ok_or_else(|| DecodeError::InvalidTimestamp(format!("{} out of range", secs)))
}
