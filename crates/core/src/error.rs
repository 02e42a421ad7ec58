//! Unified error types for the ingestion engine.
//!
//! Error codes:
//! - DECODE_001: Event could not be decoded into a row (dropped, non-fatal)
//! - FLUSH_001: Bulk load transaction failed (buffer lost, non-fatal)
//! - CONN_001: Storage connection could not be established (fatal to one worker)

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single serialized event was rejected by the codec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("payload must be a JSON object")]
    PayloadNotObject,

    #[error("invalid field: {0}")]
    InvalidField(String),
}

/// Storage-side error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// FLUSH_001: Bulk load failed and was rolled back
    FlushFailed,
    /// CONN_001: Could not connect to storage
    ConnectFailed,
}

impl StorageErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FlushFailed => "FLUSH_001",
            Self::ConnectFailed => "CONN_001",
        }
    }
}

/// Unified error type for the ingestion engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("[DECODE_001] {0}")]
    Decode(#[from] DecodeError),

    /// Bulk load failed; the transaction was rolled back.
    #[error("[{code}] {message}")]
    Flush { code: &'static str, message: String },

    /// Storage unreachable.
    #[error("[{code}] {message}")]
    Connection { code: &'static str, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a flush error.
    pub fn flush(msg: impl Into<String>) -> Self {
        Self::Flush {
            code: StorageErrorCode::FlushFailed.code(),
            message: msg.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            code: StorageErrorCode::ConnectFailed.code(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Decode(_) => Some("DECODE_001"),
            Self::Flush { code, .. } => Some(code),
            Self::Connection { code, .. } => Some(code),
            _ => None,
        }
    }
}
