//! Engine-to-engine transfer with a durable completion marker.

use bridge_traits::FlagStore;
use core_runtime::events::{CoreEvent, EventBus, MigrationEvent};
use core_store::{Collection, LocalStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;

/// Durable marker read at every startup to decide whether to migrate
pub const MIGRATION_COMPLETE_FLAG: &str = "store_migration.completed";

/// One collection that failed to transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionFailure {
    pub collection: String,
    pub message: String,
}

/// Aggregate outcome of a migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// The run finished and the completion marker is set
    pub completed: bool,
    /// The marker was already set; nothing was transferred
    pub already_complete: bool,
    /// Records transferred per collection
    pub migrated: BTreeMap<String, u64>,
    /// Collections that failed; the run continued past them
    pub failures: Vec<CollectionFailure>,
}

impl MigrationReport {
    /// Total records transferred
    pub fn total_records(&self) -> u64 {
        self.migrated.values().sum()
    }
}

/// One-shot transfer of all collections between store engines.
///
/// Transfers the six domain collections and the sync queue itself, so
/// mutations captured offline survive the engine switch. A failing
/// collection is recorded and skipped; the run is still marked complete at
/// the end. Re-runs are the operator's call, and safe, because every
/// transfer is an upsert.
pub struct StoreMigrator {
    source: Arc<dyn LocalStore>,
    target: Arc<dyn LocalStore>,
    flags: Arc<dyn FlagStore>,
    event_bus: Option<EventBus>,
}

impl StoreMigrator {
    pub fn new(
        source: Arc<dyn LocalStore>,
        target: Arc<dyn LocalStore>,
        flags: Arc<dyn FlagStore>,
    ) -> Self {
        Self {
            source,
            target,
            flags,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: MigrationEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Migration(event)).ok();
        }
    }

    /// Run the migration; a no-op returning immediately once the completion
    /// marker is set.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        if self.flags.get_bool(MIGRATION_COMPLETE_FLAG).await? == Some(true) {
            info!("Store migration already complete, skipping");
            return Ok(MigrationReport {
                completed: true,
                already_complete: true,
                ..MigrationReport::default()
            });
        }

        let mut report = MigrationReport::default();

        for collection in Collection::ALL {
            match self.transfer(collection).await {
                Ok(count) => {
                    info!(collection = %collection, records = count, "Migrated collection");
                    report.migrated.insert(collection.as_str().to_string(), count);
                    self.emit(MigrationEvent::CollectionMigrated {
                        collection: collection.as_str().to_string(),
                        records: count,
                    });
                }
                Err(e) => {
                    error!(collection = %collection, error = %e, "Collection transfer failed");
                    report.failures.push(CollectionFailure {
                        collection: collection.as_str().to_string(),
                        message: e.to_string(),
                    });
                    self.emit(MigrationEvent::CollectionFailed {
                        collection: collection.as_str().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // Marked complete even with partial failures; the report carries
        // everything the operator needs to decide on a manual re-run
        self.flags.set_bool(MIGRATION_COMPLETE_FLAG, true).await?;
        report.completed = true;

        if report.failures.is_empty() {
            info!(
                total_records = report.total_records(),
                "Store migration complete"
            );
        } else {
            warn!(
                total_records = report.total_records(),
                failures = report.failures.len(),
                "Store migration complete with failures"
            );
        }
        self.emit(MigrationEvent::Completed {
            total_records: report.total_records(),
            failures: report.failures.len() as u64,
        });

        Ok(report)
    }

    async fn transfer(&self, collection: Collection) -> Result<u64> {
        let records = self.source.scan(collection).await?;
        if !records.is_empty() {
            self.target.upsert(collection, &records).await?;
        }
        Ok(records.len() as u64)
    }

    /// Delete the legacy engine's data.
    ///
    /// Never called automatically; run it only after independently verifying
    /// the new store serves correctly.
    pub async fn cleanup_legacy_store(&self) -> Result<()> {
        warn!("Wiping legacy store data");
        self.source.wipe().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteFlagStore;
    use core_store::{DocumentStore, SqliteStore, StoreError};
    use serde_json::{json, Value};

    async fn seeded_document_store(dir: &tempfile::TempDir) -> Arc<dyn LocalStore> {
        let store = DocumentStore::open(dir.path().join("legacy")).await.unwrap();

        store
            .upsert(
                Collection::Products,
                &[
                    json!({"id": "p1", "tenant_id": "t1", "name": "Chalk", "sku": null,
                           "price_cents": 150, "stock": 10, "synced_at": 1000}),
                    json!({"id": "p2", "tenant_id": "t1", "name": "Duster", "sku": null,
                           "price_cents": 300, "stock": 2, "synced_at": null}),
                ],
            )
            .await
            .unwrap();
        store
            .upsert(
                Collection::Sales,
                &[json!({"id": "s1", "tenant_id": "t1", "customer_id": null,
                         "total_cents": 450, "created_at": 5, "synced": true})],
            )
            .await
            .unwrap();
        store
            .upsert(
                Collection::SyncQueue,
                &[json!({"id": 1, "tenant_id": "t1", "operation": "create",
                         "collection": "sales",
                         "payload": {"id": "s2", "tenant_id": "t1"},
                         "created_at": 9, "retry_count": 0,
                         "status": "pending", "last_error": null})],
            )
            .await
            .unwrap();

        Arc::new(store)
    }

    async fn setup(
        dir: &tempfile::TempDir,
    ) -> (Arc<dyn LocalStore>, Arc<dyn LocalStore>, Arc<dyn FlagStore>) {
        let source = seeded_document_store(dir).await;
        let target: Arc<dyn LocalStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let flags: Arc<dyn FlagStore> = Arc::new(SqliteFlagStore::in_memory().await.unwrap());
        (source, target, flags)
    }

    #[tokio::test]
    async fn test_migrate_transfers_every_collection() {
        let dir = tempfile::tempdir().unwrap();
        let (source, target, flags) = setup(&dir).await;
        let migrator = StoreMigrator::new(source, Arc::clone(&target), flags);

        let report = migrator.migrate().await.unwrap();

        assert!(report.completed);
        assert!(!report.already_complete);
        assert!(report.failures.is_empty());
        assert_eq!(report.migrated["products"], 2);
        assert_eq!(report.migrated["sales"], 1);
        assert_eq!(report.migrated["sync_queue"], 1);
        assert_eq!(report.total_records(), 4);

        assert_eq!(target.scan(Collection::Products).await.unwrap().len(), 2);
        assert_eq!(target.scan(Collection::Sales).await.unwrap().len(), 1);
        // Pending mutations survive the engine switch
        assert_eq!(target.scan(Collection::SyncQueue).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_migrate_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (source, target, flags) = setup(&dir).await;
        let migrator = StoreMigrator::new(source, Arc::clone(&target), flags);

        let first = migrator.migrate().await.unwrap();
        let counts_after_first = target.scan(Collection::Products).await.unwrap().len();

        let second = migrator.migrate().await.unwrap();
        assert!(second.already_complete);
        assert!(second.migrated.is_empty());
        assert_eq!(
            target.scan(Collection::Products).await.unwrap().len(),
            counts_after_first
        );
        assert_eq!(first.total_records(), 4);
    }

    #[tokio::test]
    async fn test_rerun_after_marker_reset_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let (source, target, flags) = setup(&dir).await;
        let migrator = StoreMigrator::new(source, Arc::clone(&target), Arc::clone(&flags));

        migrator.migrate().await.unwrap();
        // Operator forces a re-run; upserts keep it duplication-free
        flags.delete(MIGRATION_COMPLETE_FLAG).await.unwrap();
        let report = migrator.migrate().await.unwrap();

        assert_eq!(report.migrated["products"], 2);
        assert_eq!(target.scan(Collection::Products).await.unwrap().len(), 2);
        assert_eq!(target.scan(Collection::Sales).await.unwrap().len(), 1);
    }

    /// Target wrapper that rejects one collection's writes
    struct FailingTarget {
        inner: Arc<dyn LocalStore>,
        poisoned: Collection,
    }

    #[async_trait::async_trait]
    impl LocalStore for FailingTarget {
        async fn get(
            &self,
            collection: Collection,
            id: &str,
        ) -> core_store::Result<Option<Value>> {
            self.inner.get(collection, id).await
        }
        async fn query(
            &self,
            collection: Collection,
            tenant_id: &str,
        ) -> core_store::Result<Vec<Value>> {
            self.inner.query(collection, tenant_id).await
        }
        async fn scan(&self, collection: Collection) -> core_store::Result<Vec<Value>> {
            self.inner.scan(collection).await
        }
        async fn upsert(
            &self,
            collection: Collection,
            records: &[Value],
        ) -> core_store::Result<()> {
            if collection == self.poisoned {
                return Err(StoreError::Init("disk full".to_string()));
            }
            self.inner.upsert(collection, records).await
        }
        async fn delete(&self, collection: Collection, id: &str) -> core_store::Result<()> {
            self.inner.delete(collection, id).await
        }
        async fn clear_tenant(&self, tenant_id: &str) -> core_store::Result<()> {
            self.inner.clear_tenant(tenant_id).await
        }
        async fn get_flag(&self, key: &str) -> core_store::Result<Option<String>> {
            self.inner.get_flag(key).await
        }
        async fn set_flag(&self, key: &str, value: &str) -> core_store::Result<()> {
            self.inner.set_flag(key, value).await
        }
        async fn delete_flag(&self, key: &str) -> core_store::Result<()> {
            self.inner.delete_flag(key).await
        }
        async fn wipe(&self) -> core_store::Result<()> {
            self.inner.wipe().await
        }
    }

    #[tokio::test]
    async fn test_partial_failure_continues_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (source, target, flags) = setup(&dir).await;
        let failing: Arc<dyn LocalStore> = Arc::new(FailingTarget {
            inner: Arc::clone(&target),
            poisoned: Collection::Products,
        });
        let migrator = StoreMigrator::new(source, failing, Arc::clone(&flags));

        let report = migrator.migrate().await.unwrap();

        assert!(report.completed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].collection, "products");
        // The collections after the failing one still transferred
        assert_eq!(report.migrated["sales"], 1);
        assert_eq!(target.scan(Collection::Sales).await.unwrap().len(), 1);
        assert!(target.scan(Collection::Products).await.unwrap().is_empty());

        // The run is marked complete even with failures
        assert_eq!(
            flags.get_bool(MIGRATION_COMPLETE_FLAG).await.unwrap(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn test_cleanup_wipes_legacy_store_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let (source, target, flags) = setup(&dir).await;
        let migrator = StoreMigrator::new(Arc::clone(&source), target, flags);

        migrator.migrate().await.unwrap();
        // Migration itself never touches the legacy data
        assert_eq!(source.scan(Collection::Products).await.unwrap().len(), 2);

        migrator.cleanup_legacy_store().await.unwrap();
        assert!(source.scan(Collection::Products).await.unwrap().is_empty());
        assert!(source.scan(Collection::SyncQueue).await.unwrap().is_empty());
    }
}
