//! # FleetOps Server
//!
//! Loads configuration, prepares the database, starts the cadence-driven jobs
//! and serves the HTTP API until Ctrl-C.

use anyhow::Context;
use fleetops_core::clock::{Clock, SystemClock};
use fleetops_core::config::ConfigManager;
use fleetops_core::database::{run_migrations, DatabaseConnection};
use fleetops_core::logging::init_structured_logging;
use fleetops_core::scheduler::{CadenceRunner, ReportingJob, RetentionJob, Scheduler};
use fleetops_core::web::{create_app, AppState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("failed to load configuration")?;
    info!(source = %manager.source().display(), "Configuration loaded");
    let config = manager.into_config();
    let bind_address = config.web.socket_addr()?;

    let connection = DatabaseConnection::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    let pool = connection.into_pool();
    // Applies pending migrations and refuses to start on an incomplete schema
    run_migrations(&pool).await.context("database schema is not ready")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(pool.clone(), clock.clone(), &config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut job_handles = Vec::new();
    if config.scheduler.enabled {
        let runner = CadenceRunner::new(clock.clone(), shutdown_rx.clone());
        let scheduler = Scheduler::new(
            pool.clone(),
            state.templates.clone(),
            config.scheduler.policies.clone(),
            config.scheduler.unit_timeout(),
        )
        .with_shutdown(shutdown_rx.clone());
        let retention = RetentionJob::new(
            pool.clone(),
            config.scheduler.retention_days,
            config.scheduler.retention_batch_size,
        );
        let reporting = ReportingJob::new(pool.clone(), clock.clone(), config.scheduler.unit_timeout());

        job_handles.push(runner.spawn(Arc::new(scheduler), config.scheduler.generation_cadence));
        job_handles.push(runner.spawn(Arc::new(retention), config.scheduler.retention_cadence));
        job_handles.push(runner.spawn(Arc::new(reporting), config.scheduler.reporting_cadence));
    } else {
        warn!("Scheduler disabled by configuration; no background jobs started");
    }

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "🚀 WEB: Listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("HTTP server failed")?;

    for handle in job_handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Background job ended abnormally");
        }
    }
    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}
