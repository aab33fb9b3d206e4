//! Periodic removal of idle buckets.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::clock::Clock;
use super::limiter::Limiter;
use super::store::BucketStore;

/// Background task that sweeps a limiter's store on a fixed interval.
///
/// Sweeps go through [`BucketStore::sweep_expired`], which takes the same
/// per-token locks as request handling.
pub struct Sweeper;

impl Sweeper {
    /// Spawn the sweep loop on the current tokio runtime.
    pub fn spawn<S, C>(
        limiter: Arc<Limiter<S, C>>,
        interval: Duration,
        idle_grace_ms: u64,
    ) -> SweeperHandle
    where
        S: BucketStore + 'static,
        C: Clock + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        info!(
            interval_ms = interval.as_millis() as u64,
            idle_grace_ms = idle_grace_ms,
            "Starting bucket sweeper"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = limiter.sweep(idle_grace_ms).await {
                            warn!(error = %e, "Bucket sweep failed");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("Stopping bucket sweeper");
                        break;
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running [`Sweeper`].
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Bucket sweeper task ended abnormally");
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}
