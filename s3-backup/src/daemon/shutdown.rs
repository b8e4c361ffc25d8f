//! Graceful shutdown handling for SIGTERM and SIGINT.
//!
//! A signal cancels the shared shutdown token. A running backup pass stops
//! starting new uploads, lets the ones in flight complete, and the scheduler
//! returns once that pass has drained.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shutdown coordinator
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token cancelled when shutdown begins
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token without waiting for a signal
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait for SIGTERM or SIGINT, then cancel the token.
    ///
    /// Returns early, without cancelling, if shutdown was already triggered.
    pub async fn wait_for_signal(&self) {
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
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = self.token.cancelled() => return,
        }

        self.token.cancel();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
