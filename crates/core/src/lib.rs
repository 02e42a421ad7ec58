//! Core types, event codec, and storage seam for the agent log ingestion engine.

pub mod codec;
pub mod error;
pub mod events;
pub mod generator;
pub mod storage;

pub use codec::EventCodec;
pub use error::{DecodeError, Error, Result};
pub use events::*;
pub use storage::{StorageBackend, StorageConnection};
