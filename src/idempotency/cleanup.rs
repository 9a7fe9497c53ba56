use crate::idempotency::IdempotencyManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Periodic sweep of expired idempotency records.
///
/// The loop is cooperative: `stop` signals shutdown and then awaits the task,
/// so callers know the sweep has actually exited before tearing down.
pub struct CleanupTask {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl CleanupTask {
    pub fn spawn(manager: Arc<IdempotencyManager>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so startup isn't a sweep.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = manager.cleanup_expired();
                        crate::observability::get_metrics().record_idempotency_sweep(removed);
                        if removed > 0 {
                            tracing::debug!(removed, "idempotency sweep completed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("idempotency cleanup task stopping");
                        break;
                    }
                }
            }
        });
        Self { handle, shutdown }
    }

    /// Signals the loop and blocks until it has exited.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::IdempotencyConfig;

    #[tokio::test(start_paused = true)]
    async fn test_stop_joins_the_loop() {
        let manager = Arc::new(IdempotencyManager::new(IdempotencyConfig::default()));
        let task = CleanupTask::spawn(Arc::clone(&manager), Duration::from_secs(3600));
        task.stop().await;
    }
}
