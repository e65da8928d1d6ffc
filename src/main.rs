//! StayTuned Server: real-time presence and channel fan-out
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt};

use staytuned_api::{AppState, build_router};
use staytuned_auth::JwtVerifier;
use staytuned_core::config::AppConfig;
use staytuned_database::DatabasePool;
use staytuned_realtime::{EngineDeps, RealtimeEngine};

#[tokio::main]
async fn main() {
    let env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %format!("{e:#}"), "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting StayTuned v{}", env!("CARGO_PKG_VERSION"));

    if config.server.internal_api_key.is_empty() {
        tracing::warn!("No internal API key configured, internal routes will reject all calls");
    }

    // ── Step 1: Database connection ──────────────────────────────
    let db = DatabasePool::connect(&config.database)
        .await
        .context("Database connection failed")?;
    let repositories = db.repositories();

    // ── Step 2: Capabilities ─────────────────────────────────────
    let deps = EngineDeps {
        verifier: Arc::new(JwtVerifier::new(&config.auth)),
        subscriptions: repositories.subscriptions,
        notifications: repositories.notifications,
        presence: repositories.presence,
    };

    // ── Step 3: Realtime engine ──────────────────────────────────
    let engine = RealtimeEngine::new(config.realtime.clone(), deps);
    let sweeper = engine.start();

    // ── Step 4: HTTP server ──────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let app = build_router(AppState::new(config, engine.clone()));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(addr = %addr, "StayTuned server listening");

    let shutdown_engine = engine.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Closing sessions ends every WebSocket task so the server can drain.
            shutdown_engine.shutdown().await;
        })
        .await
        .context("Server error")?;

    // ── Step 5: Teardown ─────────────────────────────────────────
    if tokio::time::timeout(grace, sweeper).await.is_err() {
        tracing::warn!("Idle sweeper did not stop within the grace period");
    }
    db.close().await;
    tracing::info!("StayTuned server stopped");

    Ok(())
}

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
