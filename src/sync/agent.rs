// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::client::{ClientError, PizzaApi};
use crate::metrics::LatencyTimer;
use crate::model::NewPizza;
use crate::queue::{PendingQueue, QueueError};
use crate::resilience::ConnectivityMonitor;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("pending-write queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("batch upload failed: {0}")]
    Upload(#[from] ClientError),
    #[error("batch upload timed out after {0:?}")]
    Timeout(Duration),
}

impl SyncError {
    /// Failures that say the server is unreachable rather than unwilling.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            SyncError::Upload(e) => e.is_network(),
            SyncError::Timeout(_) => true,
            SyncError::Queue(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Queue was empty, no request was made
    Empty,
    /// `sent` entries went up in one request, the server created `created`
    Synced { sent: usize, created: usize },
}

/// Drain counters since the agent was built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub drains_succeeded: u64,
    pub drains_failed: u64,
    pub items_synced: u64,
}

pub struct SyncAgent {
    queue: Arc<PendingQueue>,
    api: Arc<dyn PizzaApi>,
    upload_timeout: Duration,
    /// Single-flight guard for [`SyncAgent::drain_and_sync`]
    drain_lock: Mutex<()>,
    drains_succeeded: AtomicU64,
    drains_failed: AtomicU64,
    items_synced: AtomicU64,
}

impl SyncAgent {
    pub fn new(queue: Arc<PendingQueue>, api: Arc<dyn PizzaApi>, upload_timeout: Duration) -> Self {
        Self {
            queue,
            api,
            upload_timeout,
            drain_lock: Mutex::new(()),
            drains_succeeded: AtomicU64::new(0),
            drains_failed: AtomicU64::new(0),
            items_synced: AtomicU64::new(0),
        }
    }

    /// Upload everything queued as one batch.
    ///
    /// Callers that arrive while a drain is running wait for it, then read the
    /// queue afresh, so nothing the first drain cleared is sent twice. On
    /// failure the queue is left exactly as it was.
    pub async fn drain_and_sync(&self) -> Result<DrainOutcome, SyncError> {
        let _guard = self.drain_lock.lock().await;
        let _timer = LatencyTimer::new("sync", "drain");

        let snapshot = self.queue.snapshot().await?;
        let Some(last_seq) = snapshot.last().map(|w| w.seq) else {
            debug!("Nothing queued, skipping sync");
            return Ok(DrainOutcome::Empty);
        };

        let payloads: Vec<NewPizza> = snapshot.into_iter().map(|w| w.payload).collect();
        let sent = payloads.len();
        info!(count = sent, last_seq, "Syncing queued pizzas");

        let upload = tokio::time::timeout(self.upload_timeout, self.api.create_pizzas(&payloads));
        let created = match upload.await {
            Ok(Ok(created)) => created,
            Ok(Err(e)) => return Err(self.failed(sent, e.into())),
            Err(_) => return Err(self.failed(sent, SyncError::Timeout(self.upload_timeout))),
        };

        // The server has the batch now. If clearing fails the entries will be
        // sent again on the next drain; nothing is lost.
        if let Err(e) = self.queue.remove_through(last_seq).await {
            error!(error = %e, last_seq, "Batch uploaded but queue could not be cleared");
            return Err(self.failed(sent, e.into()));
        }

        self.drains_succeeded.fetch_add(1, Ordering::Relaxed);
        self.items_synced.fetch_add(sent as u64, Ordering::Relaxed);
        crate::metrics::record_sync_drain(sent, true);
        info!(sent, created = created.len(), "Queued pizzas synced");

        Ok(DrainOutcome::Synced {
            sent,
            created: created.len(),
        })
    }

    fn failed(&self, pending: usize, err: SyncError) -> SyncError {
        self.drains_failed.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_sync_drain(pending, false);
        warn!(error = %err, pending, "Sync failed, entries stay queued until next reconnect");
        err
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            drains_succeeded: self.drains_succeeded.load(Ordering::Relaxed),
            drains_failed: self.drains_failed.load(Ordering::Relaxed),
            items_synced: self.items_synced.load(Ordering::Relaxed),
        }
    }

    /// Drain once at start if online, then on every offline→online edge,
    /// until `shutdown` flips to true.
    ///
    /// Edges are tracked by the monitor's reconnect generation, not the
    /// watched value: a flip that happens while a drain is running still
    /// triggers another drain once it finishes.
    ///
    /// A drain that fails on the network is reported to `connectivity`, so
    /// repeated failures flip the client offline and the next probe success
    /// produces a fresh edge.
    #[tracing::instrument(skip_all)]
    pub async fn run(
        self: Arc<Self>,
        connectivity: Arc<ConnectivityMonitor>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut online = connectivity.subscribe();
        let mut seen_generation = connectivity.reconnect_generation();
        let started_online = *online.borrow_and_update();

        info!(online = started_online, "Sync agent started");
        if started_online {
            self.drain_on_trigger(&connectivity).await;
        }

        loop {
            tokio::select! {
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    let generation = connectivity.reconnect_generation();
                    if generation != seen_generation {
                        seen_generation = generation;
                        if now_online {
                            self.drain_on_trigger(&connectivity).await;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(stats = ?self.stats(), "Sync agent stopped");
    }

    async fn drain_on_trigger(&self, connectivity: &ConnectivityMonitor) {
        match self.drain_and_sync().await {
            Ok(_) => {}
            Err(e) if e.is_network() => connectivity.record_failure(),
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PizzaView;
    use crate::storage::{DocumentStore, InMemoryStore};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    /// Records every batch it is sent, optionally failing them all.
    #[derive(Default)]
    struct RecordingApi {
        batches: StdMutex<Vec<Vec<String>>>,
        fail: bool,
        store: InMemoryStore,
    }

    #[async_trait]
    impl PizzaApi for RecordingApi {
        async fn create_pizza(&self, pizza: &NewPizza) -> Result<PizzaView, ClientError> {
            let mut all = self.create_pizzas(std::slice::from_ref(pizza)).await?;
            all.pop().ok_or_else(|| ClientError::Decode("empty".into()))
        }
        async fn create_pizzas(&self, pizzas: &[NewPizza]) -> Result<Vec<PizzaView>, ClientError> {
            self.batches
                .lock()
                .unwrap()
                .push(pizzas.iter().map(|p| p.pizza_name.clone()).collect());
            if self.fail {
                return Err(ClientError::Network("connection refused".into()));
            }
            self.store
                .create_pizzas(pizzas.to_vec())
                .await
                .map_err(|e| ClientError::Rejected { status: 400, message: e.to_string() })
        }
        async fn ping(&self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    async fn queue_in(dir: &std::path::Path) -> Arc<PendingQueue> {
        Arc::new(PendingQueue::open(dir.join("q.db"), 100).await.unwrap())
    }

    #[tokio::test]
    async fn test_empty_queue_makes_no_request() {
        let dir = tempdir().unwrap();
        let api = Arc::new(RecordingApi::default());
        let agent = SyncAgent::new(queue_in(dir.path()).await, api.clone(), Duration::from_secs(1));

        assert_eq!(agent.drain_and_sync().await.unwrap(), DrainOutcome::Empty);
        assert!(api.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_sends_one_ordered_batch() {
        let dir = tempdir().unwrap();
        let queue = queue_in(dir.path()).await;
        queue.enqueue(&NewPizza::new("A", "x")).await.unwrap();
        queue.enqueue(&NewPizza::new("B", "x")).await.unwrap();

        let api = Arc::new(RecordingApi::default());
        let agent = SyncAgent::new(queue.clone(), api.clone(), Duration::from_secs(1));

        let outcome = agent.drain_and_sync().await.unwrap();
        assert_eq!(outcome, DrainOutcome::Synced { sent: 2, created: 2 });
        assert_eq!(*api.batches.lock().unwrap(), vec![vec!["A".to_string(), "B".to_string()]]);
        assert!(queue.is_empty().await.unwrap());
        assert_eq!(agent.stats().items_synced, 2);
    }

    #[tokio::test]
    async fn test_failed_drain_leaves_queue_intact() {
        let dir = tempdir().unwrap();
        let queue = queue_in(dir.path()).await;
        queue.enqueue(&NewPizza::new("A", "x")).await.unwrap();
        let before = queue.snapshot().await.unwrap();

        let failing = Arc::new(RecordingApi { fail: true, ..Default::default() });
        let agent = SyncAgent::new(queue.clone(), failing, Duration::from_secs(1));

        let err = agent.drain_and_sync().await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(queue.snapshot().await.unwrap(), before);
        assert_eq!(agent.stats().drains_failed, 1);
    }

    #[tokio::test]
    async fn test_rejected_batch_is_not_network() {
        let dir = tempdir().unwrap();
        let queue = queue_in(dir.path()).await;
        queue.enqueue(&NewPizza::new("", "x")).await.unwrap();

        let api = Arc::new(RecordingApi::default());
        let agent = SyncAgent::new(queue.clone(), api, Duration::from_secs(1));

        let err = agent.drain_and_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Upload(ClientError::Rejected { status: 400, .. })));
        assert!(!err.is_network());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    struct SlowApi;

    #[async_trait]
    impl PizzaApi for SlowApi {
        async fn create_pizza(&self, _: &NewPizza) -> Result<PizzaView, ClientError> {
            unreachable!()
        }
        async fn create_pizzas(&self, _: &[NewPizza]) -> Result<Vec<PizzaView>, ClientError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        async fn ping(&self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_upload_timeout_counts_as_failure() {
        let dir = tempdir().unwrap();
        let queue = queue_in(dir.path()).await;
        queue.enqueue(&NewPizza::new("A", "x")).await.unwrap();

        let agent = SyncAgent::new(queue.clone(), Arc::new(SlowApi), Duration::from_millis(50));

        let err = agent.drain_and_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    async fn wait_until_empty(queue: &PendingQueue) {
        for _ in 0..200 {
            if queue.is_empty().await.unwrap() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue did not drain: {} left", queue.len().await.unwrap());
    }

    #[tokio::test]
    async fn test_run_drains_at_start_when_online() {
        let dir = tempdir().unwrap();
        let queue = queue_in(dir.path()).await;
        queue.enqueue(&NewPizza::new("A", "x")).await.unwrap();
        queue.enqueue(&NewPizza::new("B", "x")).await.unwrap();

        let api = Arc::new(RecordingApi::default());
        let agent = Arc::new(SyncAgent::new(queue.clone(), api.clone(), Duration::from_secs(1)));
        let monitor = Arc::new(ConnectivityMonitor::new(true, 1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(agent.clone().run(monitor.clone(), shutdown_rx));

        // No transition at all: the start-up drain alone empties the queue.
        wait_until_empty(&queue).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(*api.batches.lock().unwrap(), vec![vec!["A".to_string(), "B".to_string()]]);
        assert_eq!(monitor.reconnect_generation(), 0);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    /// First upload is held open until released, then fails on the network.
    /// Later uploads succeed.
    #[derive(Default)]
    struct FlakyGatedApi {
        calls: AtomicU64,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
        inner: RecordingApi,
    }

    #[async_trait]
    impl PizzaApi for FlakyGatedApi {
        async fn create_pizza(&self, pizza: &NewPizza) -> Result<PizzaView, ClientError> {
            self.inner.create_pizza(pizza).await
        }
        async fn create_pizzas(&self, pizzas: &[NewPizza]) -> Result<Vec<PizzaView>, ClientError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
                return Err(ClientError::Network("connection reset".into()));
            }
            self.inner.create_pizzas(pizzas).await
        }
        async fn ping(&self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reconnect_during_drain_triggers_another_drain() {
        let dir = tempdir().unwrap();
        let queue = queue_in(dir.path()).await;
        queue.enqueue(&NewPizza::new("A", "x")).await.unwrap();

        let api = Arc::new(FlakyGatedApi::default());
        let agent = Arc::new(SyncAgent::new(queue.clone(), api.clone(), Duration::from_secs(5)));
        let monitor = Arc::new(ConnectivityMonitor::new(true, 5));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(agent.clone().run(monitor.clone(), shutdown_rx));

        // Start-up drain is in flight: connection drops and comes back.
        api.entered.notified().await;
        monitor.set_online(false);
        monitor.set_online(true);
        api.release.notify_one();

        wait_until_empty(&queue).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
        assert_eq!(agent.stats().drains_failed, 1);
        assert_eq!(agent.stats().drains_succeeded, 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_drains_on_reconnect_and_stops() {
        let dir = tempdir().unwrap();
        let queue = queue_in(dir.path()).await;
        queue.enqueue(&NewPizza::new("A", "x")).await.unwrap();

        let api = Arc::new(RecordingApi::default());
        let agent = Arc::new(SyncAgent::new(queue.clone(), api.clone(), Duration::from_secs(1)));
        let monitor = Arc::new(ConnectivityMonitor::new(false, 1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(agent.clone().run(monitor.clone(), shutdown_rx));

        // Offline at start: nothing sent.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(api.batches.lock().unwrap().is_empty());

        monitor.set_online(true);
        for _ in 0..50 {
            if queue.is_empty().await.unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(queue.is_empty().await.unwrap());
        assert_eq!(api.batches.lock().unwrap().len(), 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
