//! Shutdown coordination for background loops and server tasks.
//!
//! Every long-running task (publish loop, cleanup loops, accept loops) holds a
//! clone of the same [`ShutdownState`] and stops once shutdown is initiated.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared shutdown flag that tasks can poll or await.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    initiated: Arc<watch::Sender<bool>>,
}

impl ShutdownState {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            initiated: Arc::new(sender),
        }
    }

    /// Returns true once shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        *self.initiated.borrow()
    }

    /// Initiates shutdown and wakes every task waiting in [`ShutdownState::wait`].
    pub fn initiate_shutdown(&self) {
        if !self.initiated.send_replace(true) {
            info!("🛑 Shutdown initiated - background tasks will stop");
        }
    }

    /// Resolves once shutdown has been initiated.
    pub async fn wait(&self) {
        let mut receiver = self.initiated.subscribe();
        // The sender lives as long as self, so this only returns on shutdown.
        let _ = receiver.wait_for(|initiated| *initiated).await;
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}
