//! FieldSync Agent
//!
//! Headless process that keeps a device's local store in sync: probes the
//! backend, drains the queue whenever connectivity returns and logs every
//! status change.

use fieldsync::config::Config;
use fieldsync::local_db::LocalDatabase;
use fieldsync::remote::RestClient;
use fieldsync::sync::{spawn_auto_sync, spawn_probe, ConnectivityMonitor, SyncManager};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = Config::from_env()?;
    tracing::info!("[STARTUP] Backend {}", config.api_url());
    tracing::info!("[STARTUP] Local store {}", config.db_path().display());

    let db = LocalDatabase::open(config.db_path()).await?;
    let stats = db.stats().await?;
    tracing::info!(
        "[STARTUP] {} cached jobs, {} pending changes, {} dead letters",
        stats.jobs,
        stats.pending_mutations,
        stats.dead_letters
    );

    let remote = Arc::new(
        RestClient::new(config.api_url(), config.api_key())?
            .with_photo_bucket(config.sync().photo_bucket.clone()),
    );

    // Start offline; the first successful probe triggers the first drain.
    let monitor = Arc::new(ConnectivityMonitor::new(false));
    let manager = Arc::new(SyncManager::new(
        db,
        remote.clone(),
        monitor.clone(),
        config.sync().clone(),
    ));

    let _subscription = manager.subscribe(|status| match &status.error {
        Some(error) => tracing::error!("[Sync] {}", error),
        None => tracing::info!("[Sync] syncing={} progress={}%", status.syncing, status.progress),
    });

    if let Some(technician_id) = config.technician_id() {
        match manager.download_jobs_for_offline(technician_id).await {
            Ok(count) => tracing::info!("[STARTUP] Downloaded {} jobs for offline use", count),
            Err(e) => tracing::warn!("[STARTUP] Job download failed: {}", e),
        }
    }

    let auto_sync = spawn_auto_sync(manager.clone());
    let probe = spawn_probe(monitor, remote, config.sync().probe_interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("[SHUTDOWN] Stopping");

    probe.abort();
    auto_sync.abort();
    manager.db().close().await;

    let metrics = manager.metrics();
    tracing::info!(
        "[SHUTDOWN] {} drains, {} changes synced, {} failed attempts",
        metrics.drains_completed,
        metrics.items_synced,
        metrics.items_failed
    );

    Ok(())
}
