//! Telemetry event and row types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::DecodeError;

/// Severity level of an agent log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    /// Returns the level as stored in the `level` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = DecodeError;

    /// Case-insensitive; `WARNING` is accepted as `WARN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            other => Err(DecodeError::InvalidField(format!("unknown level '{}'", other))),
        }
    }
}

/// A single agent log event, as produced by a caller before serialization.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
    #[validate(length(min = 1, max = 256))]
    pub agent_id: String,
    pub level: Level,
    #[validate(length(min = 1, max = 256))]
    pub action: String,
    pub payload: Map<String, Value>,
    pub embedding: Vec<f32>,
}

impl TelemetryEvent {
    /// Serializes the event into its wire representation (one batch entry).
    pub fn to_wire(&self) -> String {
        let ts = self.timestamp.timestamp() as f64
            + f64::from(self.timestamp.timestamp_subsec_micros()) / 1_000_000.0;

        serde_json::json!({
            "ts": ts,
            "agent_id": self.agent_id,
            "level": self.level,
            "action": self.action,
            "payload": self.payload,
            "embedding": self.embedding,
        })
        .to_string()
    }
}

/// Wire shape of a serialized event.
///
/// Every field is optional here so that absence can be reported as
/// `DecodeError::MissingField` instead of a generic parse failure.
#[derive(Debug, Deserialize)]
pub(crate) struct WireEvent {
    pub ts: Option<Value>,
    pub agent_id: Option<String>,
    pub level: Option<String>,
    pub action: Option<String>,
    pub payload: Option<Value>,
    pub embedding: Option<Vec<f32>>,
}

/// A decoded, storage-ready row: `(ts, agent_id, level, action, payload, embedding)`.
///
/// `payload` is canonical JSON text and `embedding` is a pgvector literal
/// (`[0.1,0.2,...]`), both ready to be written as COPY text columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub level: Level,
    pub action: String,
    pub payload: String,
    pub embedding: String,
}

/// Columns written by the bulk loader, in order.
pub const LOG_COLUMNS: [&str; 6] = ["ts", "agent_id", "level", "action", "payload", "embedding"];
