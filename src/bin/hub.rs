use std::sync::Arc;

use clap::Parser;
use elevator_telemetry::{
    actors::{BroadcastHandle, PersistenceRelay, SchedulerHandle},
    api::{ApiState, spawn_api_server},
    config::{Config, StorageConfig, read_config_file},
    storage::{MemoryBackend, StorageBackend},
};
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("elevator_telemetry", LevelFilter::DEBUG),
        ("telemetry_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory storage, readings are lost on restart");
            Ok(Arc::new(MemoryBackend::new()))
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            use elevator_telemetry::storage::sqlite::SqliteBackend;

            info!("using SQLite storage at {}", path.display());
            Ok(Arc::new(SqliteBackend::new(path).await?))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { path } => {
            tracing::warn!(
                "SQLite storage requested at {} but not compiled in, using in-memory storage",
                path.display()
            );
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => {
            debug!("no config file given, using defaults");
            Config::default()
        }
    }
    .with_env_overrides();

    let storage = open_storage(&config.storage).await?;

    let hub = BroadcastHandle::spawn(config.hub.clone());
    let relay = PersistenceRelay::new(Arc::clone(&storage), &config.relay);
    let scheduler = SchedulerHandle::spawn(Arc::clone(&storage), &config.scheduler)?;

    let state = ApiState::new(
        Arc::clone(&storage),
        hub.clone(),
        relay,
        scheduler.clone(),
        config.hub.keepalive(),
    );
    let addr = spawn_api_server(&config.api, state).await?;
    info!("telemetry hub ready on {addr}");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    hub.shutdown().await;
    scheduler.shutdown().await;
    if let Err(e) = storage.close().await {
        error!("failed to close storage: {e}");
    }

    Ok(())
}
