//! Service binary for Mosaic.
//!
//! Wires together configuration, the grid store, the placement arbiter
//! and the grid API server, then serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `mosaic-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Open the configured grid store (memory, or `PostgreSQL` with
//!    migrations, an initial feed sync and a commit listener)
//! 4. Build application state and start the presence sweeper
//! 5. Serve HTTP + `WebSocket` until shutdown
//! 6. Close the store

mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mosaic_api::{AppState, ServerConfig};
use mosaic_core::config::LoggingConfig;
use mosaic_core::{MosaicConfig, StoreBackend};
use mosaic_store::{
    GridStore, MemoryStore, MemoryStoreConfig, PostgresConfig, PostgresStore,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Path of the configuration file, relative to the working directory.
const CONFIG_PATH: &str = "mosaic-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, store startup or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("mosaic-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        width = config.grid.width,
        height = config.grid.height,
        reveal_threshold = config.grid.reveal_threshold,
        max_attempts = config.placement.max_attempts,
        backend = ?config.store.backend,
        "Configuration loaded"
    );

    // 3. Open the grid store.
    let store = open_store(&config).await?;
    let placed = store.handle().feed().current().total_placed();
    info!(backend = store.handle().backend_name(), placed, "Grid store ready");

    // 4. Application state and presence sweeper.
    let state = Arc::new(AppState::from_config(store.handle(), &config));
    let sweeper = state
        .presence
        .spawn_sweeper(Duration::from_secs(config.presence.sweep_interval_secs.max(1)));

    // 5. Serve until Ctrl-C.
    let server_config = ServerConfig::from(&config.server);
    let served = mosaic_api::start_server(&server_config, state, shutdown_signal()).await;

    // 6. Tear down.
    sweeper.abort();
    store.close().await;
    served.map_err(EngineError::from)?;

    info!("mosaic-engine shutdown complete");
    Ok(())
}

/// Load `mosaic-config.yaml`, falling back to defaults when it is absent.
///
/// Environment overrides apply in both cases. The returned flag says
/// whether the file was found.
fn load_config() -> Result<(MosaicConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((MosaicConfig::from_file(config_path)?, true))
    } else {
        Ok((MosaicConfig::parse("")?, false))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// The running store plus whatever background work it needs.
enum RunningStore {
    Memory(MemoryStore),
    Postgres {
        store: PostgresStore,
        listener: JoinHandle<()>,
    },
}

impl RunningStore {
    fn handle(&self) -> Arc<dyn GridStore> {
        match self {
            Self::Memory(store) => Arc::new(store.clone()),
            Self::Postgres { store, .. } => Arc::new(store.clone()),
        }
    }

    async fn close(self) {
        match self {
            Self::Memory(store) => store.close(),
            Self::Postgres { store, listener } => {
                listener.abort();
                store.close().await;
            }
        }
    }
}

/// Open the backend named in the configuration.
async fn open_store(config: &MosaicConfig) -> Result<RunningStore, EngineError> {
    let (width, height) = (config.grid.width, config.grid.height);
    match config.store.backend {
        StoreBackend::Memory => {
            let store_config = MemoryStoreConfig {
                acquire_timeout: config.store.acquire_timeout(),
                max_open_transactions: config.store.max_open_transactions,
            };
            Ok(RunningStore::Memory(MemoryStore::new(
                width,
                height,
                &store_config,
            )))
        }
        StoreBackend::Postgres => {
            let pg_config = PostgresConfig::new(&config.store.postgres_url)
                .with_max_connections(config.store.max_connections)
                .with_acquire_timeout(config.store.acquire_timeout());
            let store = PostgresStore::connect(&pg_config, width, height).await?;
            store.run_migrations().await?;
            let loaded = store.sync_feed().await?;
            info!(loaded, "Grid feed loaded from PostgreSQL");
            let listener = store.spawn_feed_listener();
            Ok(RunningStore::Postgres { store, listener })
        }
    }
}

/// Resolve when the process receives `Ctrl-C`.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
