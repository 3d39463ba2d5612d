//! KV Bridge
//!
//! An HTTP front end for a Redis key/value store. Each request is validated,
//! translated into a single backend command (or one per pair for bulk sets)
//! and answered with a plain-text body. The backend connection is
//! authenticated with a client certificate and trusts only the configured CA.
//!
//! ## API Endpoints
//!
//! - `POST /set_key` - Store every pair of a JSON object of strings
//! - `GET /get_key?key=<key>` - Return the raw value of a key
//! - `POST /del_key` - Remove the key named in `{"key": "..."}`
//! - anything else - `403 Forbidden`
//!
//! ## Startup
//!
//! 1. Load configuration (TOML file plus `KV_BRIDGE_*` overrides)
//! 2. Build the TLS trust context, if backend TLS is enabled
//! 3. Connect and ping the backend; failure exits the process
//! 4. Bind the listener and serve until Ctrl-C / SIGTERM

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod server;
pub mod storage;
pub mod tls;

pub use api::create_router;
pub use api::error::ApiError;
pub use api::handlers::AppState;
pub use config::{BackendKind, BridgeConfig, ConfigError};
pub use error::BootError;
pub use storage::{KvStore, MemoryStore, RedisStore, RedisStoreConfig, StorageError};
pub use tls::{TlsError, TlsPaths, TlsVersion, TrustContext};
