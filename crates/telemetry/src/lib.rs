//! Observability for the agent log ingestion engine.
//!
//! Structured logging via `tracing`, per-engine counters exposed as
//! snapshots, and a small health registry for the storage backend.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
