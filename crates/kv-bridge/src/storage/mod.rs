//! Storage abstraction for the bridge
//!
//! This module provides a trait-based abstraction over the key/value backend,
//! enabling both the Redis client (default) and an in-memory store used for
//! local development and tests.
//!
//! Absence of a key is never an error: `get` returns `Ok(None)` and `exists`
//! returns `Ok(false)`. Every `Err` is a backend failure.

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use self::redis::{RedisStore, RedisStoreConfig};

use async_trait::async_trait;
use std::fmt::Debug;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend call timed out after {0} ms")]
    Timeout(u64),
}

impl From<::redis::RedisError> for StorageError {
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            StorageError::Connection(err.to_string())
        } else {
            StorageError::Backend(err.to_string())
        }
    }
}

/// Key/value backend used by the HTTP handlers
///
/// Implementations must be thread-safe and support concurrent access from
/// many in-flight requests without additional locking by the caller.
#[async_trait]
pub trait KvStore: Send + Sync + Debug {
    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), StorageError>;

    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Check whether `key` is present
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove `key`; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
