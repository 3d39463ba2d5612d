//! KV Bridge Server Binary
//!
//! Runs the HTTP bridge in front of the configured key/value backend.

use std::env;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use kv_bridge::{server, BridgeConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_level = env::var("KV_BRIDGE_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set tracing subscriber: {e}");
        return ExitCode::FAILURE;
    }

    // The Redis client builds its own rustls config; pin the provider it uses
    let _ = rustls::crypto::ring::default_provider().install_default();

    match run().await {
        Ok(()) => {
            info!("Bridge stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Bridge failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> kv_bridge::error::Result<()> {
    let config = BridgeConfig::load()?;
    info!(config = ?config, "Loaded configuration");

    let store = server::connect_store(&config).await?;

    info!(
        server_port = config.server_port,
        backend = ?config.backend,
        redis = %format!("{}:{}", config.redis_host, config.redis_port),
        tls = config.use_redis_tls,
        "Starting server"
    );

    let listener = server::bind(config.server_port).await?;
    server::serve(listener, store, server::shutdown_signal()).await
}
