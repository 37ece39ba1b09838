//! HTTP server initialization and runtime setup.
//!
//! Handles the database pool, migrations, background workers and the Axum
//! server lifecycle including graceful shutdown.

use crate::application::flush_scheduler::run_flush_loop;
use crate::config::Config;
use crate::domain::task_worker::run_task_worker;
use crate::infrastructure::persistence::{
    PgCampaignRepository, PgHitRepository, PgUrlRepository,
};
use crate::routes::app_router;
use crate::state::{AppState, EngineSettings, Repositories};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Upper bound on draining the background queue after the server stops.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Engine state (cache, click accountant, dispatcher)
/// - Background task worker and periodic flush loop
/// - Axum HTTP server
///
/// On SIGINT/SIGTERM the server stops accepting connections, the flush loop
/// runs one final flush, and the background queue is drained for at most
/// [`WORKER_DRAIN_TIMEOUT`].
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let pool = Arc::new(pool);
    let repositories = Repositories {
        campaigns: Arc::new(PgCampaignRepository::new(pool.clone())),
        urls: Arc::new(PgUrlRepository::new(pool.clone())),
        hits: Arc::new(PgHitRepository::new(pool.clone())),
    };

    let (state, task_rx) =
        AppState::build(repositories.clone(), EngineSettings::from_config(&config))?;

    let worker = tokio::spawn(run_task_worker(
        task_rx,
        repositories.urls.clone(),
        repositories.hits.clone(),
        config.task_worker_concurrency,
    ));
    tracing::info!(
        concurrency = config.task_worker_concurrency,
        "Background task worker started"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flusher = tokio::spawn(run_flush_loop(
        state.accountant.clone(),
        config.flush_interval(),
        shutdown_rx,
    ));
    tracing::info!(
        interval_secs = config.flush_interval_seconds,
        "Flush loop started"
    );

    let app = app_router(state, config.behind_proxy);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, flushing pending clicks");
    let _ = shutdown_tx.send(true);
    match flusher.await {
        Ok(report) if report.failures > 0 => {
            tracing::warn!(failures = report.failures, "Some clicks could not be flushed");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Flush loop panicked"),
    }

    // The router, and with it every queue sender, is gone once serve returns.
    match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await {
        Ok(_) => tracing::info!("Background queue drained"),
        Err(_) => tracing::warn!("Background queue drain timed out"),
    }

    pool.close().await;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
