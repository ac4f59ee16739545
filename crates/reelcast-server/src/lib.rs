//! reelcast-server: HTTP and WebSocket API for the transcode service.
//!
//! This crate ties the core types and the encoder runner into a running
//! server. It provides:
//!
//! - Axum-based HTTP API for uploads, transcodes and progress polling
//! - WebSocket progress push per job
//! - Background reaper for finished progress entries
//! - Graceful shutdown via signal handling

pub mod catalog;
pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reelcast_core::config::Config;
use reelcast_core::ProgressRegistry;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the reelcast server.
///
/// Discovers the encoder, prepares the storage directories, spawns the
/// registry reaper and serves HTTP until a shutdown signal is received.
pub async fn start(config: Config) -> reelcast_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tools = Arc::new(reelcast_av::ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; transcodes will fail", info.name);
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| reelcast_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config, tools);
    ctx.catalog.ensure_dirs()?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        reelcast_core::Error::Internal(format!("Failed to bind to {addr}: {e}"))
    })?;
    tracing::info!("Starting server on {addr}");

    serve(listener, ctx, CancellationToken::new()).await
}

/// Serve the API on an already bound listener until `cancel` fires or a
/// shutdown signal arrives.
pub async fn serve(
    listener: TcpListener,
    ctx: AppContext,
    cancel: CancellationToken,
) -> reelcast_core::Result<()> {
    let reaper = match ctx.config.registry.retention() {
        Some(retention) => Some(spawn_reaper(
            Arc::clone(&ctx.registry),
            retention,
            ctx.config.registry.reap_interval(),
            cancel.clone(),
        )),
        None => {
            tracing::debug!("Progress retention disabled; entries are kept forever");
            None
        }
    };

    let app = router::build_router(ctx);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(reelcast_core::Error::from);

    cancel.cancel();
    if let Some(handle) = reaper {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    result
}

/// Periodically drop finished progress entries older than `retention`.
///
/// A zero `every` disables the reaper; the returned task exits at once.
pub fn spawn_reaper(
    registry: Arc<ProgressRegistry>,
    retention: Duration,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if every.is_zero() {
            return;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(every) => {
                    let removed = registry.reap_expired(retention);
                    if removed > 0 {
                        tracing::info!(removed, "Reaped finished progress entries");
                    }
                }
            }
        }
        tracing::debug!("Progress reaper stopped");
    })
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
