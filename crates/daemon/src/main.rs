use anyhow::Context;
use chrono_tz::Tz;
use control::{auto_advance, ControlContext};
use storage::Storage;
use sync::{spawn_push_worker, SyncBridge};
use tokio::sync::watch;
use tracing::{error, info};

mod config;

use config::{load_settings, parse_external_endpoint, prepare_database_url};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let zone: Tz = settings
        .event_timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid EVENT_TIMEZONE '{}': {e}", settings.event_timezone))?;
    let endpoint = parse_external_endpoint(&settings.external_state_api)?;

    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    if storage.seed_defaults().await.context("seeding default data")? {
        info!("default settings and phases created");
    }

    let bridge = SyncBridge::new(endpoint.clone());
    match &endpoint {
        Some(url) => info!(%url, "external state sync enabled"),
        None => info!("no external state API configured, sync disabled"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (pusher, sync_task) = spawn_push_worker(bridge.clone(), storage.clone(), shutdown_rx.clone());
    let ctx = ControlContext::new(storage, bridge, pusher);
    let advance_task = auto_advance::spawn(ctx, zone, shutdown_rx);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");

    // Let the in-flight tick and any queued push finish before the pool drops.
    let _ = shutdown_tx.send(true);
    let _ = advance_task.await;
    let _ = sync_task.await;

    info!("shutdown complete");
    Ok(())
}
