//! Memory Storage Module
//!
//! In-process storage adapter backed by a HashMap.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{Storage, StorageResult};

// == Memory Storage ==
/// Thread-safe in-memory key/value map.
///
/// Values are kept as structured JSON, so no string encoding happens on the
/// way in or out.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    // == Constructor ==
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Returns the number of stored slots (values and timestamps both count).
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // == Keys ==
    /// Returns all stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: Value) -> StorageResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_set_and_get() {
        let storage = MemoryStorage::new();

        storage.set_item("key1", json!({"a": 1})).await.unwrap();
        let value = storage.get_item("key1").await.unwrap();

        assert_eq!(value, Some(json!({"a": 1})));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_get_absent() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_overwrite() {
        let storage = MemoryStorage::new();

        storage.set_item("key1", json!("v1")).await.unwrap();
        storage.set_item("key1", json!("v2")).await.unwrap();

        assert_eq!(storage.get_item("key1").await.unwrap(), Some(json!("v2")));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_remove() {
        let storage = MemoryStorage::new();

        storage.set_item("key1", json!(1)).await.unwrap();
        storage.remove_item("key1").await.unwrap();
        // Removing again is a no-op
        storage.remove_item("key1").await.unwrap();

        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_memory_keys_sorted() {
        let storage = MemoryStorage::new();

        storage.set_item("b", json!(2)).await.unwrap();
        storage.set_item("a", json!(1)).await.unwrap();

        assert_eq!(storage.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
