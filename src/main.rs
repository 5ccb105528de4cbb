//! eventkeep - event-sourced persistence service
//!
//! Connects to PostgreSQL, makes sure the schema exists, and keeps the user
//! profile projection caught up with the event log until shutdown.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventkeep::event_store::PgEventStore;
use eventkeep::jobs::ProjectionCatchUpJob;
use eventkeep::projection::{PgCursorStore, PgUserProfileStore, UserProjection};
use eventkeep::{db, Config};

/// Initialize tracing/logging
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eventkeep=debug,sqlx=warn".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.json_logs());

    tracing::info!(environment = %config.environment, "Starting eventkeep");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    db::verify_connection(&pool).await?;

    if !db::check_schema(&pool).await? {
        if config.is_production() {
            return Err(anyhow::anyhow!("Database schema incomplete"));
        }
        db::migrate(&pool).await?;
    }

    tracing::info!("Database connected successfully");

    let store = PgEventStore::with_policy(pool.clone(), config.snapshot_policy);
    let projection = UserProjection::new(
        Arc::new(PgUserProfileStore::new(pool.clone())),
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(PgCursorStore::new(pool.clone())),
    )
    .with_retry_policy(config.retry_policy())
    .with_strategy(config.rebuild_strategy)
    .with_page_size(config.rebuild_page_size);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let job = ProjectionCatchUpJob::new(projection, config.catch_up_interval).start(shutdown_rx);

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    // A closed channel also stops the job
    let _ = shutdown_tx.send(true);
    if let Err(e) = job.await {
        tracing::error!(error = %e, "Catch-up job ended abnormally");
    }

    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
