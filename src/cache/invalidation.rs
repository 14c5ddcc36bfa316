//! Background invalidation.
//!
//! Writers call [`InvalidationQueue::dispatch`] and return immediately; the
//! worker runs the mutation hook in every partition. Until it does, readers
//! may still see the stale entry.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::cache::registry::PartitionRegistry;
use crate::observability::metrics;

/// Sending side, cheap to clone.
#[derive(Clone)]
pub struct InvalidationQueue {
    tx: mpsc::UnboundedSender<Vec<String>>,
}

impl InvalidationQueue {
    /// Queue a mutation of `tables`. Never blocks.
    pub fn dispatch(&self, tables: Vec<String>) {
        if tables.is_empty() {
            return;
        }
        if let Err(e) = self.tx.send(tables) {
            tracing::error!(tables = ?e.0, "Invalidation worker gone, mutation dropped");
            metrics::record_invalidation_dropped();
        }
    }
}

/// Receiving side; consumed by [`InvalidationWorker::run`].
pub struct InvalidationWorker {
    rx: mpsc::UnboundedReceiver<Vec<String>>,
    registry: Arc<PartitionRegistry>,
}

/// Create a connected queue/worker pair.
pub fn channel(registry: Arc<PartitionRegistry>) -> (InvalidationQueue, InvalidationWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InvalidationQueue { tx }, InvalidationWorker { rx, registry })
}

impl InvalidationWorker {
    /// Process mutations until every queue handle is dropped or shutdown is
    /// signalled. Pending mutations are drained before returning.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Invalidation worker started");
        loop {
            tokio::select! {
                next = self.rx.recv() => match next {
                    Some(tables) => self.apply(tables).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    while let Ok(tables) = self.rx.try_recv() {
                        self.apply(tables).await;
                    }
                    break;
                }
            }
        }
        tracing::info!("Invalidation worker stopped");
    }

    async fn apply(&self, tables: Vec<String>) {
        let entries = self.registry.invalidate_everywhere(&tables).await;
        tracing::debug!(tables = ?tables, entries, "Background invalidation applied");
        metrics::record_background_invalidation(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::durable::DurableBackend;
    use crate::cache::registry::CacheSettings;
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dispatch_is_applied_in_background() {
        let registry = Arc::new(PartitionRegistry::new(
            CacheSettings {
                enabled: true,
                default_ttl_secs: 300,
                shadow_capacity: 16,
                backend: DurableBackend::Memory,
                stale_on_open: Vec::new(),
            },
            Arc::new(ManualClock::new(0)),
        ));
        registry.facade("global").put("k", Bytes::from_static(b"v"), &["hotfixes"], None).await;

        let (queue, worker) = channel(registry.clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(worker.run(shutdown_rx));

        queue.dispatch(vec!["hotfixes".to_string()]);

        let mut gone = false;
        for _ in 0..50 {
            if registry.facade("global").get("k").await.is_none() {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(gone, "entry should be invalidated by the worker");

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_after_worker_stopped_does_not_panic() {
        let registry = Arc::new(PartitionRegistry::new(
            CacheSettings {
                enabled: true,
                default_ttl_secs: 300,
                shadow_capacity: 16,
                backend: DurableBackend::Memory,
                stale_on_open: Vec::new(),
            },
            Arc::new(ManualClock::new(0)),
        ));
        let (queue, worker) = channel(registry);
        drop(worker);
        queue.dispatch(vec!["hotfixes".to_string()]);
    }
}
