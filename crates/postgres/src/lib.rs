//! PostgreSQL + pgvector storage backend for the ingestion engine.

pub mod client;
pub mod config;
pub mod copy;
pub mod health;
pub mod query;
pub mod schema;

pub use client::*;
pub use config::*;
pub use copy::PgCopyConnection;
