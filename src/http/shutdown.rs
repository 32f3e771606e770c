//! Graceful shutdown on SIGTERM/SIGINT.
//!
//! The listener stops accepting connections, drains in-flight requests for up
//! to [`SHUTDOWN_DRAIN_SECS`] and then returns, ending the process.

use std::time::Duration;

use axum_server::Handle;

use crate::config::SHUTDOWN_DRAIN_SECS;

/// Wait for Ctrl+C or SIGTERM, then begin draining `handle`.
pub fn setup_shutdown_handler(handle: Handle) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
        }

        handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_DRAIN_SECS)));
        tracing::info!(
            drain_secs = SHUTDOWN_DRAIN_SECS,
            "Graceful shutdown initiated, waiting for connections to close"
        );
    });
}
