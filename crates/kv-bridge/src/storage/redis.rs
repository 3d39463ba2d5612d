//! Redis storage backend
//!
//! Network implementation of [`KvStore`] on top of a multiplexed
//! `ConnectionManager`. The manager is cheap to clone and safe to share
//! across tasks, so every operation works on its own clone of the handle.
//!
//! When a [`TrustContext`] is supplied the connection uses TLS with client
//! certificate authentication; otherwise it is plaintext.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::{KvStore, StorageError};
use crate::tls::TrustContext;

/// Connection settings for the Redis backend
pub struct RedisStoreConfig {
    /// Backend host name or address
    pub host: String,
    /// Backend port
    pub port: u16,
    /// ACL user name (empty means none)
    pub username: String,
    /// ACL password (empty means none)
    pub password: String,
    /// Trust context; `None` means plaintext transport
    pub trust: Option<TrustContext>,
    /// Upper bound on any single backend call
    pub timeout: Duration,
}

impl fmt::Debug for RedisStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.trust.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisStoreConfig {
    /// `host:port` of the backend
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connection_info(&self) -> ConnectionInfo {
        let addr = if self.trust.is_some() {
            ConnectionAddr::TcpTls {
                host: self.host.clone(),
                port: self.port,
                insecure: false,
                tls_params: None,
            }
        } else {
            ConnectionAddr::Tcp(self.host.clone(), self.port)
        };

        ConnectionInfo {
            addr,
            redis: RedisConnectionInfo {
                username: non_empty(&self.username),
                password: non_empty(&self.password),
                ..Default::default()
            },
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Redis-backed key/value store
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    address: String,
    timeout: Duration,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisStore {
    /// Open the managed connection to the backend
    ///
    /// This does not ping; callers decide whether an unreachable backend is
    /// fatal.
    pub async fn connect(config: RedisStoreConfig) -> Result<Self, StorageError> {
        let address = config.address();
        let info = config.connection_info();

        let client = match &config.trust {
            Some(trust) => redis::Client::build_with_tls(info, trust.redis_certificates()),
            None => redis::Client::open(info),
        }
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        // One attempt only; a refused connection must surface immediately
        let manager_config = ConnectionManagerConfig::new().set_number_of_retries(0);
        let connecting = ConnectionManager::new_with_config(client, manager_config);

        let conn = tokio::time::timeout(config.timeout, connecting)
            .await
            .map_err(|_| StorageError::Connection(format!("timed out connecting to {address}")))?
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        info!(address = %address, tls = config.trust.is_some(), "Connected to Redis");

        Ok(Self {
            conn,
            address,
            timeout: config.timeout,
        })
    }

    /// `host:port` this store talks to
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call<T, F>(&self, op: &'static str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                debug!(op = op, address = %self.address, error = %e, "Redis command failed");
                Err(e.into())
            }
            Err(_) => {
                let ms = self.timeout.as_millis() as u64;
                debug!(op = op, address = %self.address, timeout_ms = ms, "Redis command timed out");
                Err(StorageError::Timeout(ms))
            }
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: String = self
            .call("PING", async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn.clone();
        self.call("GET", async move { conn.get(key).await }).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        self.call("SET", async move { conn.set(key, value).await }).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn.clone();
        self.call("EXISTS", async move { conn.exists(key).await }).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _removed: i64 = self.call("DEL", async move { conn.del(key).await }).await?;
        Ok(())
    }
}
