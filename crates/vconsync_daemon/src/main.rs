//! vconsyncd
//!
//! Replicates the `vcon:` keyspace from Redis into a MongoDB collection:
//! one reconciliation scan to establish the destination baseline, then a
//! keyspace-notification listener for the rest of the process lifetime.
//! Interrupt (Ctrl-C) shuts it down cleanly with exit code 0.

mod config;

use config::DaemonConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vconsync_engine::{EngineConfig, SyncEngine};
use vconsync_store::{MongoDestination, RedisSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = DaemonConfig::from_env()?;

    info!(
        host = %config.redis_host,
        port = config.redis_port,
        db = config.redis_db,
        "connecting to source store"
    );
    let source =
        RedisSource::connect(&config.redis_host, config.redis_port, config.redis_db).await?;

    info!(
        db = %config.mongo_db,
        collection = %config.mongo_collection,
        "connecting to destination store"
    );
    let destination =
        MongoDestination::connect(&config.mongo_uri, &config.mongo_db, &config.mongo_collection)
            .await?;

    let engine = SyncEngine::new(
        EngineConfig::default().with_database(config.redis_db),
        source,
        destination,
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for interrupt signal");
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = engine.run(shutdown).await {
        error!(error = %e, "replication engine failed");
        return Err(e.into());
    }

    info!("shutting down");
    Ok(())
}
