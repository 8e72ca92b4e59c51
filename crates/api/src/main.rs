use std::net::SocketAddr;
use std::sync::Arc;

use blockjobs_api::config::ServerConfig;
use blockjobs_api::router::build_app_router;
use blockjobs_api::state::AppState;
use blockjobs_worker::config::EngineConfig;
use blockjobs_worker::handlers::{build_router, http_client};
use blockjobs_worker::store::PgJobStore;
use blockjobs_worker::{BatchExecutor, JobStore, Reconciler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blockjobs_api=debug,blockjobs_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let engine_config = EngineConfig::from_env().expect("Invalid engine configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = blockjobs_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    blockjobs_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    blockjobs_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Engine ---
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));
    let client = http_client(&engine_config).expect("Failed to build HTTP client");
    let job_router = build_router(&engine_config, Arc::clone(&store), client)
        .expect("Every job type must have a handler");
    let executor = BatchExecutor::new(Arc::clone(&store), Arc::new(job_router));
    let reconciler = Reconciler::from_config(Arc::clone(&store), &engine_config);
    tracing::info!(
        orphan_policy = engine_config.orphan_policy.as_str(),
        "Job engine ready",
    );

    // --- App state ---
    let state = AppState {
        store,
        executor,
        reconciler: Arc::new(reconciler),
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or (on Unix) SIGTERM so in-flight batches can finish
/// before the process exits.
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
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
