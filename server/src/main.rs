use std::net::SocketAddr;
use std::process;

use dotenvy::dotenv;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use event_api::config::{Config, ConfigError};
use event_api::db::Database;
use event_api::routes::create_routes;
use event_api::state::AppState;

const DEFAULT_LOG_FILTER: &str = "event_api=info,tower_http=info";

#[derive(Debug, Error)]
enum BootError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("database is unreachable: {0}")]
    Database(#[source] sqlx::Error),

    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("connection pool became unusable")]
    PoolFault,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server stopped");
        process::exit(1);
    }
}

async fn run() -> Result<(), BootError> {
    let config = Config::from_env()?;
    config.mode.install();
    tracing::info!(mode = ?config.mode, port = config.port, "Configuration loaded");

    let db = Database::connect(&config.database);

    db.ping().await.map_err(BootError::Database)?;
    tracing::info!(
        host = %config.database.host,
        database = %config.database.name,
        "Successfully connected to database"
    );

    sqlx::migrate!().run(db.pool()).await?;
    tracing::info!("Migrations run successfully");

    let app = create_routes(AppState::new(db.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BootError::Bind { addr, source })?;

    tracing::info!("🚀 Server running at http://{}", addr);
    tracing::info!("📊 Health check: http://{}/health", addr);
    tracing::info!("📅 Events API: http://{}/api/events", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(db.clone()))
        .await
        .map_err(BootError::Serve)?;

    db.close().await;

    if db.is_faulted() {
        return Err(BootError::PoolFault);
    }
    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(db: Database) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
        _ = db.faulted() => tracing::error!("Database pool fault, shutting down"),
    }
}
