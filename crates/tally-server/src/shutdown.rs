//! Broker shutdown: one `CancellationToken` observed by the HTTP server,
//! the dispatcher and every session.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long the server task gets to close sessions and stop the dispatcher.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Owns the broker-wide cancellation token.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a task that must stop on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal every task.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether new sessions should be refused.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal shutdown and wait up to `grace` for the server task.
    ///
    /// Returns `false` if the task had to be aborted.
    pub async fn drain(&self, mut server: JoinHandle<()>, grace: Duration) -> bool {
        self.shutdown();
        info!(grace_secs = grace.as_secs(), "draining sessions");
        if tokio::time::timeout(grace, &mut server).await.is_ok() {
            true
        } else {
            warn!("server did not stop within {grace:?}, aborting");
            server.abort();
            false
        }
    }
}
