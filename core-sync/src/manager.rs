//! # Sync Manager
//!
//! Orchestrates queue draining against the remote service.
//!
//! ## State machine
//!
//! `Idle -> Syncing -> (Idle | Error)`. `Error` only reports that the last
//! drain had failures; the next trigger drains again from there. An atomic
//! guard keeps drains mutually exclusive: a trigger that arrives while a
//! drain runs is a no-op, not a queue-up.
//!
//! ## Triggers
//!
//! - an enqueue, debounced (~1 s) so bursts drain once
//! - the network monitor transitioning to Online
//! - a periodic timer, gated on currently being online
//!
//! ## Subscriptions
//!
//! [`SyncManager::subscribe`] hands out a `watch::Receiver<SyncSnapshot>`:
//! the current `(status, pending)` immediately, then every change. Hosts
//! surface `pending > 0` as "changes not yet saved to the server", never as
//! a blocking error.

use bridge_traits::{Clock, Operation, RemoteBackend};
use core_net::NetworkMonitor;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_store::{Collection, LocalStore};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::queue::SyncQueue;
use crate::registry::handler_for;

/// Orchestrator status, reported through snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }
}

/// What subscribers receive: current status plus undelivered item count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub pending: u64,
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainSummary {
    pub delivered: u64,
    pub failed: u64,
    /// True when another drain was already running and this call did nothing
    pub skipped: bool,
}

/// Scheduling knobs
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delay between an enqueue and the drain it triggers
    pub debounce: Duration,
    /// Periodic drain cadence, only effective while online
    pub interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            interval: Duration::from_secs(120),
        }
    }
}

struct Inner {
    queue: Arc<SyncQueue>,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteBackend>,
    monitor: NetworkMonitor,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    snapshot_tx: watch::Sender<SyncSnapshot>,
    draining: AtomicBool,
    kick_tx: mpsc::Sender<()>,
    token: CancellationToken,
}

impl Inner {
    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }

    /// Publish `(status, pending)` unless disposed
    async fn publish(&self, status: SyncStatus) -> Result<u64> {
        let pending = self.queue.len(None).await?;
        if !self.token.is_cancelled() {
            self.snapshot_tx
                .send_replace(SyncSnapshot { status, pending });
        }
        Ok(pending)
    }

    /// One complete drain pass; mutually exclusive with itself
    async fn drain(&self, tenant: Option<&str>) -> Result<DrainSummary> {
        if self.token.is_cancelled() {
            return Ok(DrainSummary {
                skipped: true,
                ..DrainSummary::default()
            });
        }
        if self.draining.swap(true, Ordering::SeqCst) {
            debug!("Drain already in progress, trigger ignored");
            return Ok(DrainSummary {
                skipped: true,
                ..DrainSummary::default()
            });
        }

        self.publish(SyncStatus::Syncing).await?;
        let outcome = self.drain_items(tenant).await;
        self.draining.store(false, Ordering::SeqCst);

        match outcome {
            Ok((delivered, failed)) => {
                let status = if failed > 0 {
                    SyncStatus::Error
                } else {
                    SyncStatus::Idle
                };
                let pending = self.publish(status).await?;
                self.emit(SyncEvent::DrainFinished {
                    delivered,
                    failed,
                    pending,
                });
                info!(
                    delivered = delivered,
                    failed = failed,
                    pending = pending,
                    "Drain finished"
                );
                Ok(DrainSummary {
                    delivered,
                    failed,
                    skipped: false,
                })
            }
            Err(e) => {
                error!(error = %e, "Drain aborted");
                self.publish(SyncStatus::Error).await.ok();
                Err(e)
            }
        }
    }

    /// Sequential delivery in queue order; per-tenant ordering is preserved
    /// because items are never reordered or parallelized.
    async fn drain_items(&self, tenant: Option<&str>) -> Result<(u64, u64)> {
        let items = self.queue.pending(tenant).await?;
        self.emit(SyncEvent::DrainStarted {
            pending: items.len() as u64,
        });

        let mut delivered = 0u64;
        let mut failed = 0u64;

        for item in items {
            if self.token.is_cancelled() {
                break;
            }

            self.queue.mark_processing(item.id).await?;

            let Some(handler) = handler_for(item.collection) else {
                self.queue
                    .mark_failed(item.id, "collection is not syncable")
                    .await?;
                failed += 1;
                continue;
            };

            let result = handler
                .deliver(self.remote.as_ref(), item.operation, &item.payload)
                .await;

            // A result arriving after dispose is discarded; the item stays
            // Processing and crash recovery re-pends it on next open
            if self.token.is_cancelled() {
                break;
            }

            match result {
                Ok(()) => {
                    self.queue.mark_succeeded(item.id).await?;
                    if let Err(e) = handler
                        .on_delivered(
                            self.store.as_ref(),
                            item.operation,
                            &item.payload,
                            self.clock.unix_timestamp_millis(),
                        )
                        .await
                    {
                        // Delivery is confirmed; a metadata write failure
                        // must not re-deliver the item
                        warn!(
                            item_id = item.id,
                            error = %e,
                            "Delivered but local sync metadata write failed"
                        );
                    }
                    delivered += 1;
                    self.emit(SyncEvent::ItemDelivered {
                        item_id: item.id,
                        collection: item.collection.as_str().to_string(),
                        tenant_id: item.tenant_id.clone(),
                    });
                }
                Err(e) => {
                    self.queue.mark_failed(item.id, &e.to_string()).await?;
                    failed += 1;
                    self.emit(SyncEvent::ItemFailed {
                        item_id: item.id,
                        collection: item.collection.as_str().to_string(),
                        retry_count: item.retry_count + 1,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok((delivered, failed))
    }
}

/// Queue-draining orchestrator with explicit lifecycle
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Inner>,
}

impl SyncManager {
    /// Start the manager and its trigger tasks.
    pub async fn start(
        queue: Arc<SyncQueue>,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteBackend>,
        monitor: NetworkMonitor,
        clock: Arc<dyn Clock>,
        options: SyncOptions,
        event_bus: Option<EventBus>,
    ) -> Result<Self> {
        let pending = queue.len(None).await?;
        let (snapshot_tx, _) = watch::channel(SyncSnapshot {
            status: SyncStatus::Idle,
            pending,
        });
        let (kick_tx, kick_rx) = mpsc::channel(1);

        let inner = Arc::new(Inner {
            queue,
            store,
            remote,
            monitor,
            clock,
            event_bus,
            snapshot_tx,
            draining: AtomicBool::new(false),
            kick_tx,
            token: CancellationToken::new(),
        });

        Self::spawn_debounce_loop(Arc::clone(&inner), kick_rx, options.debounce);
        Self::spawn_network_loop(Arc::clone(&inner));
        Self::spawn_interval_loop(Arc::clone(&inner), options.interval);

        Ok(Self { inner })
    }

    /// Trigger (a): enqueue, debounced to batch bursts
    fn spawn_debounce_loop(inner: Arc<Inner>, mut kick_rx: mpsc::Receiver<()>, debounce: Duration) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.token.cancelled() => break,
                    kick = kick_rx.recv() => {
                        if kick.is_none() {
                            break;
                        }
                        tokio::select! {
                            _ = inner.token.cancelled() => break,
                            _ = tokio::time::sleep(debounce) => {}
                        }
                        if inner.monitor.is_online() {
                            if let Err(e) = inner.drain(None).await {
                                error!(error = %e, "Post-enqueue drain failed");
                            }
                        }
                    }
                }
            }
        });
    }

    /// Trigger (b): the monitor transitioning to Online
    fn spawn_network_loop(inner: Arc<Inner>) {
        tokio::spawn(async move {
            let mut rx = inner.monitor.subscribe();
            let mut was_online = rx.borrow().is_online();
            loop {
                tokio::select! {
                    _ = inner.token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = rx.borrow().is_online();
                        if online && !was_online {
                            info!("Back online, draining queue");
                            if let Err(e) = inner.drain(None).await {
                                error!(error = %e, "Reconnect drain failed");
                            }
                        }
                        was_online = online;
                    }
                }
            }
        });
    }

    /// Trigger (c): periodic, only while online
    fn spawn_interval_loop(inner: Arc<Inner>, interval: Duration) {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    _ = inner.token.cancelled() => break,
                    _ = ticker.tick() => {
                        if inner.monitor.is_online() {
                            if let Err(e) = inner.drain(None).await {
                                error!(error = %e, "Periodic drain failed");
                            }
                        }
                    }
                }
            }
        });
    }

    /// Enqueue a mutation and schedule the debounced drain
    pub async fn submit(
        &self,
        operation: Operation,
        collection: Collection,
        payload: Value,
        tenant_id: &str,
    ) -> Result<u64> {
        let id = self
            .inner
            .queue
            .enqueue(operation, collection, payload, tenant_id)
            .await?;

        let status = self.status();
        self.inner.publish(status).await?;
        self.notify_enqueued();
        Ok(id)
    }

    /// Schedule the debounced drain for mutations enqueued directly on the
    /// queue. A full debounce window is already scheduled when this no-ops.
    pub fn notify_enqueued(&self) {
        self.inner.kick_tx.try_send(()).ok();
    }

    /// Drain immediately, bypassing the debounce (still mutually exclusive
    /// with a running drain)
    pub async fn drain_now(&self, tenant_id: Option<&str>) -> Result<DrainSummary> {
        self.inner.drain(tenant_id).await
    }

    /// Receiver yielding the current snapshot immediately, then every change
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> SyncSnapshot {
        *self.inner.snapshot_tx.borrow()
    }

    /// Current status
    pub fn status(&self) -> SyncStatus {
        self.snapshot().status
    }

    /// Cancel all trigger tasks. An in-flight delivery finishes at the
    /// remote but its result no longer mutates manager state.
    pub fn dispose(&self) {
        self.inner.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{RemoteError, SystemClock};
    use core_net::{NetworkMonitor, ProbeConfig};
    use core_store::SqliteStore;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Remote fake recording calls, optionally failing the first N
    struct ScriptedRemote {
        calls: Mutex<Vec<(String, Operation, Value)>>,
        failures: Mutex<VecDeque<String>>,
        delay: Duration,
    }

    impl ScriptedRemote {
        fn new() -> Arc<Self> {
            Self::failing(0)
        }

        fn failing(times: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(
                    (0..times).map(|n| format!("injected failure {}", n)).collect(),
                ),
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(VecDeque::new()),
                delay,
            })
        }

        fn calls(&self) -> Vec<(String, Operation, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl RemoteBackend for ScriptedRemote {
        async fn apply(
            &self,
            collection: &str,
            operation: Operation,
            payload: &Value,
        ) -> std::result::Result<(), RemoteError> {
            if self.delay > Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(message) = self.failures.lock().unwrap().pop_front() {
                return Err(RemoteError::Transport(message));
            }
            self.calls
                .lock()
                .unwrap()
                .push((collection.to_string(), operation, payload.clone()));
            Ok(())
        }
    }

    /// Probe fake that always reports a healthy link
    struct AlwaysOnline;

    #[async_trait::async_trait]
    impl bridge_traits::ProbeTransport for AlwaysOnline {
        async fn probe(
            &self,
            _url: &str,
            _timeout: Duration,
        ) -> bridge_traits::Result<Duration> {
            Ok(Duration::from_millis(20))
        }
    }

    async fn setup(remote: Arc<ScriptedRemote>) -> (SyncManager, Arc<SyncQueue>, Arc<dyn LocalStore>) {
        let store: Arc<dyn LocalStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let queue = Arc::new(
            SyncQueue::open(Arc::clone(&store), Arc::clone(&clock))
                .await
                .unwrap(),
        );
        let monitor = NetworkMonitor::start(
            Arc::new(AlwaysOnline),
            None,
            ProbeConfig::new("https://static.example.com/ping"),
            None,
        );
        monitor.check_now().await;

        let manager = SyncManager::start(
            Arc::clone(&queue),
            Arc::clone(&store),
            remote,
            monitor,
            clock,
            SyncOptions {
                debounce: Duration::from_millis(10),
                interval: Duration::from_secs(600),
            },
            None,
        )
        .await
        .unwrap();

        (manager, queue, store)
    }

    #[tokio::test]
    async fn test_drain_delivers_and_flips_synced() {
        let remote = ScriptedRemote::new();
        let (manager, queue, store) = setup(Arc::clone(&remote)).await;

        let sale = json!({
            "id": "s1", "tenant_id": "t1", "customer_id": null,
            "total_cents": 1000, "created_at": 1, "synced": false
        });
        store
            .upsert(Collection::Sales, std::slice::from_ref(&sale))
            .await
            .unwrap();
        queue
            .enqueue(Operation::Create, Collection::Sales, sale, "t1")
            .await
            .unwrap();

        let summary = manager.drain_now(None).await.unwrap();
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 0);

        assert_eq!(queue.len(None).await.unwrap(), 0);
        let local = store.get(Collection::Sales, "s1").await.unwrap().unwrap();
        assert_eq!(local["synced"], true);
        assert_eq!(remote.calls().len(), 1);
        assert_eq!(manager.status(), SyncStatus::Idle);

        manager.dispose();
    }

    #[tokio::test]
    async fn test_failed_item_puts_manager_in_error_state() {
        let remote = ScriptedRemote::failing(1);
        let (manager, queue, _store) = setup(Arc::clone(&remote)).await;

        queue
            .enqueue(
                Operation::Create,
                Collection::Sales,
                json!({"id": "s1", "tenant_id": "t1"}),
                "t1",
            )
            .await
            .unwrap();

        let summary = manager.drain_now(None).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(manager.status(), SyncStatus::Error);
        assert_eq!(manager.snapshot().pending, 1);

        // Error is reporting-only: the next drain runs and recovers
        let summary = manager.drain_now(None).await.unwrap();
        assert_eq!(summary.delivered, 1);
        assert_eq!(manager.status(), SyncStatus::Idle);
        assert_eq!(manager.snapshot().pending, 0);

        manager.dispose();
    }

    #[tokio::test]
    async fn test_empty_drain_is_idempotent() {
        let remote = ScriptedRemote::new();
        let (manager, queue, _store) = setup(remote).await;

        let before = manager.snapshot();
        manager.drain_now(None).await.unwrap();
        manager.drain_now(None).await.unwrap();

        assert_eq!(manager.snapshot(), before);
        assert_eq!(queue.len(None).await.unwrap(), 0);
        manager.dispose();
    }

    #[tokio::test]
    async fn test_concurrent_drain_is_noop() {
        let remote = ScriptedRemote::slow(Duration::from_millis(200));
        let (manager, queue, _store) = setup(remote).await;

        queue
            .enqueue(
                Operation::Create,
                Collection::Sales,
                json!({"id": "s1", "tenant_id": "t1"}),
                "t1",
            )
            .await
            .unwrap();

        let slow_manager = manager.clone();
        let slow = tokio::spawn(async move { slow_manager.drain_now(None).await });

        // Give the first drain time to claim the guard
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = manager.drain_now(None).await.unwrap();
        assert!(second.skipped);

        let first = slow.await.unwrap().unwrap();
        assert!(!first.skipped);
        assert_eq!(first.delivered, 1);
        manager.dispose();
    }

    #[tokio::test]
    async fn test_submit_triggers_debounced_drain() {
        let remote = ScriptedRemote::new();
        let (manager, _queue, _store) = setup(Arc::clone(&remote)).await;

        manager
            .submit(
                Operation::Create,
                Collection::Students,
                json!({"id": "st1", "tenant_id": "t1", "name": "Amina",
                       "class_id": null, "guardian_phone": null, "synced_at": null}),
                "t1",
            )
            .await
            .unwrap();
        assert_eq!(manager.snapshot().pending, 1);

        let mut rx = manager.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.borrow_and_update().pending != 0 {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("debounced drain should empty the queue");

        assert_eq!(remote.calls().len(), 1);
        manager.dispose();
    }

    #[tokio::test]
    async fn test_dispose_stops_triggers() {
        let remote = ScriptedRemote::new();
        let (manager, queue, _store) = setup(Arc::clone(&remote)).await;

        manager.dispose();
        queue
            .enqueue(
                Operation::Create,
                Collection::Sales,
                json!({"id": "s1", "tenant_id": "t1"}),
                "t1",
            )
            .await
            .unwrap();
        manager.notify_enqueued();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(remote.calls().is_empty());
        assert_eq!(queue.len(None).await.unwrap(), 1);

        let summary = manager.drain_now(None).await.unwrap();
        assert!(summary.skipped);
    }
}
