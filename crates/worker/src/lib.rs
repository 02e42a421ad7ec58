//! Worker pool for the agent log ingestion engine.
//!
//! Batches of serialized events go through a bounded queue to `N` workers.
//! Each worker decodes events into its own buffer and bulk-loads the buffer
//! through its own storage connection once it reaches the flush threshold.
//! On shutdown every worker drains what it still holds.

pub mod buffer;
pub mod config;
pub mod engine;
pub mod loader;
pub mod queue;
pub mod worker_loop;

pub use buffer::WorkerBuffer;
pub use config::EngineConfig;
pub use engine::{EngineReport, IngestionEngine};
pub use loader::BulkLoader;
pub use queue::{Batch, QueueItem};
pub use worker_loop::{WorkerLoop, WorkerReport, WorkerState};
