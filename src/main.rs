use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{sync::oneshot, task::JoinHandle};

mod auth;
mod config;
mod db;
mod dto;
mod error;
mod extract;
mod handlers;
mod models;
mod routes;
mod services;
mod store;

use auth::rate_limit::RateLimitState;
use config::Config;
use store::{postgres::PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub rate_limiter: RateLimitState,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindful_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    let pg = PgStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    pg.migrate()
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let store: Arc<dyn Store> = Arc::new(pg);
    let rate_limiter = RateLimitState::new();
    let cleanup = rate_limiter.spawn_cleanup();

    let state = AppState {
        store: store.clone(),
        config: config.clone(),
        rate_limiter,
    };
    let app = routes::router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(environment = %config.environment, "Starting server on {}", addr);

    let (fault_tx, mut fault_rx) = oneshot::channel();

    // Client IP is needed for rate limiting
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cleanup, fault_tx))
    .await;

    store.close().await;
    tracing::info!("Database pool closed");

    served.context("Server error")?;
    if let Ok(reason) = fault_rx.try_recv() {
        anyhow::bail!(reason);
    }
    Ok(())
}

/// Resolves on Ctrl-C, SIGTERM, or when a background task dies. The last case
/// reports through `fault` so the process exits non-zero and gets restarted.
async fn shutdown_signal(background: JoinHandle<()>, fault: oneshot::Sender<String>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
        joined = background => {
            let reason = match joined {
                Err(e) if e.is_panic() => "Background task panicked".to_string(),
                _ => "Background task exited".to_string(),
            };
            tracing::error!(reason = %reason, "Stopping server");
            let _ = fault.send(reason);
        }
    }
    tracing::info!("Received shutdown signal, draining connections");
}
