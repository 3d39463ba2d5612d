//! Startup error types for the bridge

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::tls::TlsError;

/// Result type for startup operations
pub type Result<T> = std::result::Result<T, BootError>;

/// Errors that abort the process before or while serving
#[derive(Error, Debug)]
pub enum BootError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// TLS material missing or invalid
    #[error("TLS configuration error: {0}")]
    Tls(#[from] TlsError),

    /// Backend unreachable at startup
    #[error("backend unavailable: {0}")]
    Backend(#[from] StorageError),

    /// Listener could not bind or failed while serving
    #[error("server error: {0}")]
    Listener(#[source] std::io::Error),
}
