//! Persistence collaborator
//!
//! The engine only needs `get` / `put` over serialized records. Backends:
//! - [`MemoryStore`] - in-process map, tests and ephemeral sessions
//! - [`FileStore`] - single JSON document on disk, write-through

mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupted value for {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value persistence with string keys and serialized string values.
///
/// Both calls may fail or be slow; callers await each call before touching
/// their in-memory cache again.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn put(&self, key: &str, value: String) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;

    async fn clear(&self) -> StoreResult<()>;
}
