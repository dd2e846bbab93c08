//! Recommendation Cache service binary
//!
//! Exposes one cache instance over HTTP for UI collaborators and diagnostics.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recommendation_cache::{api::create_router, AppState, Config, RecommendationCache};

/// Main entry point for the recommendation cache service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Create the cache and start its background sweep
/// 4. Create Axum router with all endpoints
/// 5. Start HTTP server on configured port
/// 6. On SIGINT/SIGTERM, stop accepting requests and close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recommendation_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting recommendation cache service");

    let config = Config::from_env();
    info!(
        max_entries = config.max_entries,
        default_ttl_ms = config.default_ttl.as_millis() as u64,
        sweep_interval_ms = config.sweep_interval.as_millis() as u64,
        eviction_fraction = config.eviction_fraction,
        port = config.server_port,
        "configuration loaded"
    );

    let state = AppState::from_config(&config).context("invalid cache configuration")?;
    let cache = state.cache.clone();
    cache.start_sweeper();

    let _change_log = cache.subscribe(|records| {
        debug!(records = records.len(), "cache contents changed");
        Ok(())
    });

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cache))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweep.
async fn shutdown_signal(cache: RecommendationCache) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cache.close();
}
