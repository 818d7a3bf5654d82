//! Worldcast server binary.
//!
//! Keeps one shared key-value world in memory and pushes every change to
//! all connected `/subscribe` WebSocket clients.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$WORLDCAST_CONFIG` (which must exist) or
//!    `worldcast.yaml` (defaults if absent), then environment overrides
//! 2. Initialize structured logging (tracing) and report rejected overrides
//! 3. Build the store, subscriber registry, and broadcaster
//! 4. Serve HTTP + WebSocket until `Ctrl-C`

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use worldcast_core::{LoadedConfig, WorldcastConfig};
use worldcast_server::AppState;

use crate::error::AppError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "worldcast.yaml";

/// Environment variable naming an alternative configuration file.
const CONFIG_PATH_ENV: &str = "WORLDCAST_CONFIG";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the server
/// cannot bind its listening address.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration.
    let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let LoadedConfig {
        config,
        source,
        rejected,
    } = WorldcastConfig::load(explicit.as_deref(), Path::new(DEFAULT_CONFIG_PATH))?;

    // 2. Initialize structured logging. RUST_LOG wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    for entry in &rejected {
        warn!(variable = entry.variable, "{entry}");
    }

    info!(
        source = %source,
        host = %config.server.host,
        port = config.server.port,
        mailbox_limit = config.subscribers.mailbox_limit,
        send_snapshot_on_connect = config.subscribers.send_snapshot_on_connect,
        "worldcast starting"
    );

    // 3. Build shared state.
    let state = Arc::new(AppState::from_config(&config));

    // 4. Serve until Ctrl-C.
    worldcast_server::start_server(&config.server, state).await?;

    info!("worldcast shutdown complete");
    Ok(())
}
