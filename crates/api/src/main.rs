use std::net::SocketAddr;
use std::sync::Arc;

use account_hub_core::scripting::python::PythonExecutor;
use account_hub_db::DbPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use account_hub_api::config::{ServerConfig, ValidationConfig};
use account_hub_api::router::build_app_router;
use account_hub_api::state::{AppState, Orchestrator};
use account_hub_api::validation::{SqlRecordStore, ValidationOrchestrator};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    let validation_config = ValidationConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        venv_base_dir = %validation_config.venv_base_dir,
        check_timeout_secs = validation_config.check_timeout.as_secs(),
        "Configuration loaded"
    );

    let pool = open_database(&config).await;
    let orchestrator = Arc::new(build_orchestrator(&pool, &validation_config));
    match orchestrator.schedule_all().await {
        Ok(count) => tracing::info!(count, "Cron schedules registered"),
        Err(e) => tracing::error!(error = %e, "Could not load cron schedules"),
    }

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        validation: Arc::clone(&orchestrator),
    };
    let app = build_app_router(state, &config);

    let ip = config.host.parse().expect("HOST must be an IP address");
    let addr = SocketAddr::new(ip, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Stops cron triggers; runs already in flight are left to finish.
    orchestrator.shutdown().await;
    tracing::info!("Shutdown complete");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "account_hub_api=debug,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect, verify, and migrate. Any failure here aborts startup.
async fn open_database(config: &ServerConfig) -> DbPool {
    let pool = account_hub_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to connect to database");
    account_hub_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    account_hub_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!(url = %config.database_url, "Database ready");
    pool
}

fn build_orchestrator(pool: &DbPool, config: &ValidationConfig) -> Orchestrator {
    let executor = PythonExecutor::new(config.venv_base_dir.clone(), config.uv_bin.clone());
    ValidationOrchestrator::new(
        Arc::new(SqlRecordStore::new(pool.clone())),
        Arc::new(executor),
        config.check_timeout,
        config.test_timeout,
    )
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
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
        _ = ctrl_c => tracing::info!("Ctrl-C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
