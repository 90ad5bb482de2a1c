//! Background expiry sweeping
//!
//! Periodically purges expired entries from a store using a tokio interval,
//! reporting each pass over a channel so the owner can log or ignore it.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::CacheStore;

/// Messages sent from the sweeper task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepMessage {
    /// One sweep pass completed
    Swept {
        /// Expired entries removed by this pass
        removed: usize,
    },
}

/// Configuration for the sweeper
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweep passes
    pub interval: Duration,
    /// Whether to spawn the sweeper at all
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling a running sweeper
pub struct SweepHandle {
    /// Channel for receiving sweep reports
    pub receiver: mpsc::Receiver<SweepMessage>,
    /// Signals shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl SweepHandle {
    /// Spawns a sweeper over `store`
    ///
    /// Must be called from within a tokio runtime. The first pass happens one
    /// full interval after spawning.
    pub fn spawn<V>(store: Arc<CacheStore<V>>, config: SweepConfig) -> Self
    where
        V: Clone + Serialize + DeserializeOwned + Send + 'static,
    {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let removed = store.sweep_expired();
                            debug!(removed, "cache sweep pass");
                            // Reports are advisory; a full channel just drops one.
                            let _ = msg_tx.try_send(SweepMessage::Swept { removed });
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Returns a pending report without blocking
    pub fn try_recv(&mut self) -> Option<SweepMessage> {
        self.receiver.try_recv().ok()
    }

    /// Stops the sweeper task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
