//! In-memory storage backend
//!
//! Process-local implementation of [`KvStore`] using a hashmap.
//! Suitable for development and tests. Data is lost on restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use super::{KvStore, StorageError};

/// In-memory key/value store implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("memory store lock poisoned".into())
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        debug!(key = %key, "Storing key in memory");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        if entries.remove(key).is_some() {
            debug!(key = %key, "Removed key from memory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();

        store.set("color", "blue").await.unwrap();

        assert_eq!(store.get("color").await.unwrap(), Some("blue".to_string()));
        assert!(store.exists("color").await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_absent_key_is_not_an_error() {
        let store = MemoryStore::new();

        assert_eq!(store.get("missing").await.unwrap(), None);
        assert!(!store.exists("missing").await.unwrap());
        // Deleting something that was never there succeeds
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryStore::new();

        store.set("k", "1").await.unwrap();
        store.set("k", "2").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some("2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_key() {
        let store = MemoryStore::new();

        store.set("k", "v").await.unwrap();
        store.delete("k").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_ping_always_succeeds() {
        assert!(MemoryStore::new().ping().await.is_ok());
    }
}
