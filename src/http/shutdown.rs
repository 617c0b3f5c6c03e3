//! Graceful shutdown: stop taking sessions, then close the ones still open.

use std::sync::Arc;
use tracing::{error, info};

use crate::http::registry::SessionRegistry;

/// Result of draining the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions closed cleanly
    pub closed: usize,
    /// Sessions whose close reported an error
    pub failed: usize,
}

/// Closes every live session once a termination signal arrives.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    registry: Arc<SessionRegistry>,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Drain the registry. A session that fails to close is logged and the
    /// rest are still closed.
    pub async fn shutdown(&self) -> ShutdownReport {
        info!("Shutting down server...");

        let mut report = ShutdownReport::default();
        for session in self.registry.begin_shutdown().await {
            info!("Closing transport for session {}", session.id());
            match session.close().await {
                Ok(()) => report.closed += 1,
                Err(e) => {
                    error!("Error closing transport for session {}: {}", session.id(), e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Server shutdown complete ({} closed, {} failed)",
            report.closed, report.failed
        );
        report
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
