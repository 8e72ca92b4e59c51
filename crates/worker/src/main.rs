use std::sync::Arc;
use std::time::Duration;

use blockjobs_worker::config::EngineConfig;
use blockjobs_worker::store::{JobStore, PgJobStore};
use blockjobs_worker::Reconciler;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blockjobs_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = EngineConfig::from_env().expect("Invalid engine configuration");
    tracing::info!(
        policy = config.orphan_policy.as_str(),
        timeout_secs = config.orphan_timeout_secs,
        interval_secs = config.reconcile_interval_secs,
        "Loaded reconciliation configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = blockjobs_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    blockjobs_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    blockjobs_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Reconciler ---
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));
    let reconciler = Reconciler::from_config(store, &config);
    let interval = config.reconcile_interval();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let mut handle = tokio::spawn(async move {
        reconciler.run(interval, cancel_clone).await;
    });

    let exited = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut handle => Some(result),
    };

    match exited {
        None => {
            cancel.cancel();
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Reconciler task failed"),
                Err(_) => tracing::warn!("Reconciler did not stop within 5s"),
            }
        }
        Some(result) => {
            match result {
                Ok(()) => tracing::error!("Reconciler exited before shutdown"),
                Err(e) => tracing::error!(error = %e, "Reconciler task failed"),
            }
            std::process::exit(1);
        }
    }
    tracing::info!("Worker stopped");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
