//! walletLedger saga worker
//!
//! Connects to the PostgreSQL event log and runs one subscription per saga
//! until Ctrl+C or SIGTERM.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_ledger::aggregate::type_registry;
use wallet_ledger::config::LogFormat;
use wallet_ledger::db;
use wallet_ledger::event_store::{EventStore, PgEventLog};
use wallet_ledger::handlers::{CommandDispatcher, CommandHandler};
use wallet_ledger::saga::{all_sagas, SagaSubscription, SubscriptionSettings};
use wallet_ledger::Config;

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wallet_ledger=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(environment = %config.environment, "Starting walletLedger saga worker");
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    db::verify_connection(&pool).await?;
    db::ensure_schema(&pool).await?;
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }
    tracing::info!("Database connected successfully");

    let registry = Arc::new(type_registry());
    let log = Arc::new(PgEventLog::new(pool.clone()));
    let store = EventStore::new(log.clone(), registry).with_batch_size(config.event_batch_size);
    let handler: Arc<dyn CommandHandler> = Arc::new(CommandDispatcher::new(store.clone()));
    let settings = SubscriptionSettings::from_config(&config);

    let shutdown = CancellationToken::new();
    let mut workers = Vec::new();
    for saga in all_sagas(&store) {
        let subscription = SagaSubscription::new(saga, log.clone(), store.clone(), handler.clone())
            .with_settings(settings);
        workers.push(Arc::new(subscription).spawn(shutdown.clone()));
    }
    tracing::info!(sagas = workers.len(), "Saga subscriptions started");

    shutdown_signal().await;
    shutdown.cancel();

    for worker in workers {
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "Saga subscription failed"),
            Err(err) => tracing::error!(error = %err, "Saga subscription task panicked"),
        }
    }

    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
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
