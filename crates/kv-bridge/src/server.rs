//! Startup sequence and HTTP listener.
//!
//! Order matters: the trust context is built and the backend pinged before
//! the listener is bound, so a misconfigured or unreachable backend stops
//! the process without ever accepting a connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::create_router;
use crate::api::handlers::AppState;
use crate::config::{BackendKind, BridgeConfig};
use crate::error::{BootError, Result};
use crate::storage::{KvStore, MemoryStore, RedisStore, RedisStoreConfig};
use crate::tls::TrustContext;

/// Build the configured store and confirm it answers a ping
pub async fn connect_store(config: &BridgeConfig) -> Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match config.backend {
        BackendKind::Memory => {
            info!("Using in-memory backend");
            Arc::new(MemoryStore::new())
        }
        BackendKind::Redis => {
            let trust = if config.use_redis_tls {
                Some(TrustContext::load(&config.tls_paths())?)
            } else {
                info!("Backend TLS disabled");
                None
            };

            let store = RedisStore::connect(RedisStoreConfig {
                host: config.redis_host.clone(),
                port: config.redis_port,
                username: config.redis_user.clone(),
                password: config.redis_password.clone(),
                trust,
                timeout: config.backend_timeout(),
            })
            .await?;
            Arc::new(store)
        }
    };

    check_backend(store.as_ref()).await?;
    Ok(store)
}

/// Single startup ping; no retries
pub async fn check_backend(store: &dyn KvStore) -> Result<()> {
    store.ping().await?;
    info!("Backend responded to ping");
    Ok(())
}

/// Bind the HTTP listener on all interfaces
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await.map_err(BootError::Listener)
}

/// Serve requests until `shutdown` resolves, then drain in-flight requests
pub async fn serve<F>(listener: TcpListener, store: Arc<dyn KvStore>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(store));
    let app = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Bridge listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(BootError::Listener)
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl KvStore for Unreachable {
        async fn ping(&self) -> std::result::Result<(), StorageError> {
            Err(StorageError::Connection("connection refused".into()))
        }
        async fn get(&self, _: &str) -> std::result::Result<Option<String>, StorageError> {
            unreachable!()
        }
        async fn set(&self, _: &str, _: &str) -> std::result::Result<(), StorageError> {
            unreachable!()
        }
        async fn exists(&self, _: &str) -> std::result::Result<bool, StorageError> {
            unreachable!()
        }
        async fn delete(&self, _: &str) -> std::result::Result<(), StorageError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_failed_ping_is_fatal() {
        let err = check_backend(&Unreachable).await.unwrap_err();
        assert!(matches!(err, BootError::Backend(StorageError::Connection(_))));
    }

    #[tokio::test]
    async fn test_memory_backend_connects() {
        let config = BridgeConfig {
            backend: BackendKind::Memory,
            ..BridgeConfig::default()
        };
        assert!(connect_store(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_redis_aborts_startup() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = BridgeConfig {
            redis_host: "127.0.0.1".into(),
            redis_port: port,
            backend_timeout_ms: 250,
            ..BridgeConfig::default()
        };

        let err = connect_store(&config).await.unwrap_err();
        assert!(matches!(err, BootError::Backend(_)));
    }

    #[tokio::test]
    async fn test_missing_tls_material_aborts_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig {
            use_redis_tls: true,
            tls_cert_path: dir.path().join("redis.crt"),
            tls_key_path: dir.path().join("redis.key"),
            tls_ca_path: dir.path().join("ca.crt"),
            ..BridgeConfig::default()
        };

        let err = connect_store(&config).await.unwrap_err();
        assert!(matches!(err, BootError::Tls(_)));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve(listener, store, async {}),
        )
        .await
        .expect("server should stop promptly");

        assert!(result.is_ok());
    }
}
