use std::env;
use std::process;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use care_hub_api::api::routes::create_app;
use care_hub_api::api::state::AppState;
use care_hub_domain::auth::start_cleanup_task;
use care_hub_domain::config::AppConfig;
use care_hub_domain::database::initialize_database_pool;

/// How often expired entries are purged from the token blacklist
const BLACKLIST_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// PostgreSQL is used when a connection URL or host is configured;
/// otherwise the server runs on in-memory storage.
fn database_requested() -> bool {
    ["DATABASE_URL", "DB_HOST"]
        .iter()
        .any(|key| env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false))
}

/// The main entry point for the CareHub API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    // Initialize tracing for structured logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(false)
            .with_ansi(true)
            .with_timer(fmt::time::uptime())
            .with_writer(std::io::stdout))
        .with(env_filter)
        .init();

    info!("Starting CareHub API server");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    info!("Environment: {}", config.server.environment);

    if database_requested() {
        match initialize_database_pool(&config.database).await {
            Ok(()) => info!("Database pool initialized successfully"),
            Err(e) => {
                error!("Failed to initialize database pool: {}", e);
                process::exit(1);
            }
        }
    } else {
        warn!("No DATABASE_URL or DB_HOST configured, data is kept in memory and lost on restart");
    }

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to build application state: {}", e);
            process::exit(1);
        }
    };

    let _cleanup = start_cleanup_task(state.tokens.blacklist(), BLACKLIST_CLEANUP_INTERVAL);

    let app = create_app(state);

    let addr = config.server.bind_address();
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    // Serve the application with graceful shutdown support
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutting down server...");
}
