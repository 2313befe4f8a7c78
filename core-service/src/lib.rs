//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] into running services: it
//! opens the configured store backend, runs queue crash recovery, starts the
//! network monitor and the sync manager, and hands the host one handle that
//! owns the lot. Engine switches go through [`migrate_store`] before
//! [`CoreService::start`]; the one-time transfer is guarded by a durable
//! marker in the host-supplied flag store, so calling it on every boot is
//! cheap and safe.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::Operation;
use core_migrate::{MigrationReport, StoreMigrator};
use core_net::{NetworkMonitor, ProbeConfig};
use core_runtime::{CoreConfig, EventBus};
use core_store::{open_store, Collection, LocalStore, StoreBackend};
use core_sync::{SyncManager, SyncOptions, SyncQueue};
use serde_json::Value;
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Construction is explicit and so is teardown: [`CoreService::dispose`]
/// cancels the monitor and manager timers. There are no module-level
/// singletons; everything the service needs arrives through the config.
#[derive(Clone)]
pub struct CoreService {
    store: Arc<dyn LocalStore>,
    queue: Arc<SyncQueue>,
    monitor: NetworkMonitor,
    sync: SyncManager,
    events: EventBus,
}

impl CoreService {
    /// Open the configured backend and start all services.
    ///
    /// Store initialization failure is fatal and propagates; there is no
    /// fallback to the other engine. Opening the queue resets any item a
    /// crashed drain left in `Processing` back to `Pending`.
    pub async fn start(config: CoreConfig) -> Result<Self> {
        let store = open_store(config.backend, &config.data_dir).await?;
        let queue = Arc::new(SyncQueue::open(Arc::clone(&store), Arc::clone(&config.clock)).await?);

        let events = EventBus::default();

        let mut probe_config = ProbeConfig::new(config.probe_url.clone());
        probe_config.timeout = config.probe_timeout;
        probe_config.interval = config.probe_interval;

        let monitor = NetworkMonitor::start(
            Arc::clone(&config.probe_transport),
            config.link_watcher,
            probe_config,
            Some(events.clone()),
        );

        let sync = SyncManager::start(
            Arc::clone(&queue),
            Arc::clone(&store),
            Arc::clone(&config.remote),
            monitor.clone(),
            Arc::clone(&config.clock),
            SyncOptions {
                debounce: config.enqueue_debounce,
                interval: config.sync_interval,
            },
            Some(events.clone()),
        )
        .await?;

        info!(backend = %config.backend, data_dir = %config.data_dir.display(), "Core started");
        Ok(Self {
            store,
            queue,
            monitor,
            sync,
            events,
        })
    }

    /// The local store serving this process
    pub fn store(&self) -> Arc<dyn LocalStore> {
        Arc::clone(&self.store)
    }

    /// The durable mutation queue
    pub fn queue(&self) -> Arc<SyncQueue> {
        Arc::clone(&self.queue)
    }

    /// The connectivity monitor
    pub fn network(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// The queue-draining orchestrator
    pub fn sync(&self) -> &SyncManager {
        &self.sync
    }

    /// The event bus all services publish to
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Persist a record locally and queue its mutation for the remote
    /// service in one call.
    pub async fn submit(
        &self,
        operation: Operation,
        collection: Collection,
        payload: Value,
        tenant_id: &str,
    ) -> Result<u64> {
        if operation != Operation::Delete {
            self.store
                .upsert(collection, std::slice::from_ref(&payload))
                .await?;
        }
        Ok(self
            .sync
            .submit(operation, collection, payload, tenant_id)
            .await?)
    }

    /// Cancel the monitor and manager timers. In-flight deliveries finish at
    /// the remote but no longer mutate local state.
    pub fn dispose(&self) {
        self.sync.dispose();
        self.monitor.dispose();
    }
}

/// Transfer all collections from `legacy` into the backend named by
/// `config.backend`, then mark the migration complete.
///
/// Run this before [`CoreService::start`] whenever the configured backend
/// changed. The completion marker lives in `config.flag_store`, outside both
/// engines, so once a run finished this returns immediately on every later
/// boot.
pub async fn migrate_store(
    config: &CoreConfig,
    legacy: StoreBackend,
) -> Result<MigrationReport> {
    if legacy == config.backend {
        return Err(CoreError::InitializationFailed(format!(
            "legacy backend and configured backend are both {}",
            legacy
        )));
    }

    let source = open_store(legacy, &config.data_dir).await?;
    let target = open_store(config.backend, &config.data_dir).await?;
    let migrator = StoreMigrator::new(source, target, Arc::clone(&config.flag_store));

    Ok(migrator.migrate().await?)
}

/// Wipe the legacy engine's data after a migration.
///
/// Never called automatically; invoke it only once the new store has been
/// independently verified to serve correctly.
pub async fn cleanup_legacy_store(config: &CoreConfig, legacy: StoreBackend) -> Result<()> {
    if legacy == config.backend {
        return Err(CoreError::InitializationFailed(format!(
            "refusing to wipe the active backend {}",
            legacy
        )));
    }

    let source = open_store(legacy, &config.data_dir).await?;
    let target = open_store(config.backend, &config.data_dir).await?;
    let migrator = StoreMigrator::new(source, target, Arc::clone(&config.flag_store));

    migrator.cleanup_legacy_store().await?;
    Ok(())
}
