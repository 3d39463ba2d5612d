//! Bridge configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! `KV_BRIDGE_*` environment variables. Every field has a default, so an
//! empty file (or no file) is a valid configuration.
//!
//! ```toml
//! server_port = 8080
//! redis_host = "redis"
//! redis_port = 6379
//! redis_user = "bridge"
//! redis_password = "secret"
//! use_redis_tls = true
//! tls_cert_path = "tls/redis.crt"
//! tls_key_path = "tls/redis.key"
//! tls_ca_path = "tls/ca.crt"
//! backend_timeout_ms = 5000
//! backend = "redis"
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::tls::TlsPaths;

/// Environment variable holding the config file path.
pub const CONFIG_PATH_ENV: &str = "KV_BRIDGE_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which store implementation backs the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote Redis server.
    #[default]
    Redis,
    /// Process-local map; nothing is persisted.
    Memory,
}

/// Top-level bridge configuration.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server_port: u16,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_user: String,
    pub redis_password: String,
    pub use_redis_tls: bool,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub tls_ca_path: PathBuf,
    pub backend_timeout_ms: u64,
    pub backend: BackendKind,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_port: 8080,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_user: String::new(),
            redis_password: String::new(),
            use_redis_tls: false,
            tls_cert_path: PathBuf::from("tls/redis.crt"),
            tls_key_path: PathBuf::from("tls/redis.key"),
            tls_ca_path: PathBuf::from("tls/ca.crt"),
            backend_timeout_ms: 5_000,
            backend: BackendKind::Redis,
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("server_port", &self.server_port)
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_user", &self.redis_user)
            .field("redis_password", &"<redacted>")
            .field("use_redis_tls", &self.use_redis_tls)
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .field("tls_ca_path", &self.tls_ca_path)
            .field("backend_timeout_ms", &self.backend_timeout_ms)
            .field("backend", &self.backend)
            .finish()
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the process configuration.
    ///
    /// Reads the file named by `KV_BRIDGE_CONFIG`, or `config.toml` if that
    /// exists, then applies environment overrides. An explicitly named file
    /// that cannot be read is an error; a missing default file is not.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KV_BRIDGE_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(v) = lookup("KV_BRIDGE_SERVER_PORT") {
            self.server_port = parse_env("KV_BRIDGE_SERVER_PORT", v)?;
        }
        if let Some(v) = lookup("KV_BRIDGE_REDIS_HOST") {
            self.redis_host = v;
        }
        if let Some(v) = lookup("KV_BRIDGE_REDIS_PORT") {
            self.redis_port = parse_env("KV_BRIDGE_REDIS_PORT", v)?;
        }
        if let Some(v) = lookup("KV_BRIDGE_REDIS_USER") {
            self.redis_user = v;
        }
        if let Some(v) = lookup("KV_BRIDGE_REDIS_PASSWORD") {
            self.redis_password = v;
        }
        if let Some(v) = lookup("KV_BRIDGE_USE_REDIS_TLS") {
            self.use_redis_tls = parse_env("KV_BRIDGE_USE_REDIS_TLS", v)?;
        }
        if let Some(v) = lookup("KV_BRIDGE_TLS_CERT_PATH") {
            self.tls_cert_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("KV_BRIDGE_TLS_KEY_PATH") {
            self.tls_key_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("KV_BRIDGE_TLS_CA_PATH") {
            self.tls_ca_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("KV_BRIDGE_BACKEND_TIMEOUT_MS") {
            self.backend_timeout_ms = parse_env("KV_BRIDGE_BACKEND_TIMEOUT_MS", v)?;
        }
        if let Some(v) = lookup("KV_BRIDGE_BACKEND") {
            self.backend = match v.to_ascii_lowercase().as_str() {
                "redis" => BackendKind::Redis,
                "memory" => BackendKind::Memory,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "KV_BRIDGE_BACKEND",
                        value: v,
                    })
                }
            };
        }
        Ok(())
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_port == 0 {
            return Err(ConfigError::Invalid("server_port must be non-zero".into()));
        }
        if self.backend == BackendKind::Redis {
            if self.redis_host.trim().is_empty() {
                return Err(ConfigError::Invalid("redis_host must not be empty".into()));
            }
            if self.redis_port == 0 {
                return Err(ConfigError::Invalid("redis_port must be non-zero".into()));
            }
        }
        if self.backend_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "backend_timeout_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// TLS material locations.
    pub fn tls_paths(&self) -> TlsPaths {
        TlsPaths {
            cert_path: self.tls_cert_path.clone(),
            key_path: self.tls_key_path.clone(),
            ca_path: self.tls_ca_path.clone(),
        }
    }

    /// Bound on each backend call.
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = BridgeConfig::from_toml("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.server_port, 8080);
        assert!(!config.use_redis_tls);
        assert_eq!(config.backend, BackendKind::Redis);
    }

    #[test]
    fn test_full_toml() {
        let config = BridgeConfig::from_toml(
            r#"
            server_port = 9000
            redis_host = "redis"
            redis_port = 6380
            redis_user = "bridge"
            redis_password = "secret"
            use_redis_tls = true
            tls_cert_path = "/etc/bridge/client.crt"
            tls_key_path = "/etc/bridge/client.key"
            tls_ca_path = "/etc/bridge/ca.crt"
            backend_timeout_ms = 1500
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.server_port, 9000);
        assert_eq!(config.redis_host, "redis");
        assert_eq!(config.redis_port, 6380);
        assert_eq!(config.redis_user, "bridge");
        assert!(config.use_redis_tls);
        assert_eq!(config.tls_paths().ca_path, PathBuf::from("/etc/bridge/ca.crt"));
        assert_eq!(config.backend_timeout(), Duration::from_millis(1500));
        assert_eq!(config.backend, BackendKind::Memory);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(matches!(
            BridgeConfig::from_toml("server_port = \"eighty\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_port_is_rejected() {
        assert!(matches!(
            BridgeConfig::from_toml("server_port = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BridgeConfig::default();
        config
            .apply_overrides(env(&[
                ("KV_BRIDGE_SERVER_PORT", "9090"),
                ("KV_BRIDGE_REDIS_HOST", "cache.internal"),
                ("KV_BRIDGE_USE_REDIS_TLS", "true"),
                ("KV_BRIDGE_BACKEND", "Memory"),
            ]))
            .unwrap();

        assert_eq!(config.server_port, 9090);
        assert_eq!(config.redis_host, "cache.internal");
        assert!(config.use_redis_tls);
        assert_eq!(config.backend, BackendKind::Memory);
        // Untouched fields keep their values
        assert_eq!(config.redis_port, 6379);
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_overrides(env(&[("KV_BRIDGE_REDIS_PORT", "not-a-port")]))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidEnv { var: "KV_BRIDGE_REDIS_PORT", .. }));
    }

    #[test]
    fn test_from_missing_file() {
        let err = BridgeConfig::from_file(Path::new("/nonexistent/kv-bridge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = BridgeConfig {
            redis_password: "hunter2".into(),
            ..BridgeConfig::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
