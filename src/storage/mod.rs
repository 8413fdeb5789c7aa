//! Storage Module
//!
//! The pluggable key/value contract the cache engine persists through, plus
//! the adapters shipped with the crate.
//!
//! # Adapters
//! - `MemoryStorage` - in-process map, values kept as structured JSON
//! - `FileStorage` - one JSON document per key on disk

mod file;
mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Convenience Result type for storage adapters.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// == Storage Trait ==
/// Key/value contract consumed by the cache engine.
///
/// Synchronous backends implement the async methods without awaiting anything.
/// `remove_item` is optional: adapters that cannot delete keep the default,
/// which reports `StorageError::RemoveUnsupported`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads a value; `Ok(None)` when the key is absent.
    async fn get_item(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Writes a value, replacing any previous one.
    async fn set_item(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Deletes a value. Deleting an absent key is not an error.
    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        let _ = key;
        Err(StorageError::RemoveUnsupported)
    }
}
