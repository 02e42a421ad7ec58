//! Storage seam between the engine and a concrete backend.
//!
//! The engine only needs two things from storage: an exclusive connection
//! per worker, and a way to bulk-load a slice of rows as one commit.

use async_trait::async_trait;

use crate::events::LogRow;
use crate::Result;

/// A storage backend that hands out one exclusive connection per worker.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Opens a new connection owned by `worker_id`.
    ///
    /// Errors are reported as `Error::Connection`; the caller owns retry policy.
    async fn connect(&self, worker_id: usize) -> Result<Box<dyn StorageConnection>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// A connection able to bulk-load rows through the backend's streaming channel.
#[async_trait]
pub trait StorageConnection: Send {
    /// Streams every row and commits once.
    ///
    /// All rows become visible or none do. On error the transaction is rolled
    /// back and `Error::Flush` is returned. Returns the committed row count.
    async fn copy_rows(&mut self, rows: &[LogRow]) -> Result<u64>;
}
