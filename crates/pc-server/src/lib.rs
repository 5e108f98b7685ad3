//! pc-server: HTTP relay over the fragment store.
//!
//! Serves the stored sync record and fragments verbatim, plus the delayed
//! sync endpoint computed by [`pc_core::DelayPlanner`]. The server only ever
//! reads the store; the collector is the sole writer.
//!
//! - [`build_router`] assembles routes and middleware.
//! - [`serve`] runs the router until a shutdown signal or cancellation.

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

pub use context::AppContext;
pub use error::AppError;
pub use router::build_router;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pc_core::{Error, Result};

/// Bind the relay's listening socket.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::Validation(format!("invalid server address {host}:{port}: {e}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind to {addr}: {e}")))
}

/// Serve the relay on `listener` until shutdown.
///
/// A SIGINT/SIGTERM cancels `cancel` so sibling tasks (the collector) stop
/// too; cancelling it from elsewhere stops the server.
pub async fn serve(
    ctx: AppContext,
    listener: TcpListener,
    cancel: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|e| Error::Internal(format!("listener has no local address: {e}")))?;
    tracing::info!("Relay listening on {local}");

    let app = build_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .map_err(|e| Error::Internal(format!("server error: {e}")))?;

    tracing::info!("Relay stopped");
    Ok(())
}

/// Wait for SIGINT, SIGTERM or cancellation, then cancel `cancel`.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Shutdown signal received"),
        _ = terminate => tracing::info!("Shutdown signal received"),
        _ = cancel.cancelled() => {}
    }

    cancel.cancel();
}
