//! # Durable Sync Queue
//!
//! Tenant-scoped, ordered log of mutations awaiting delivery to the remote
//! service, persisted inside the owning [`LocalStore`] so it survives both
//! restarts and storage-engine migrations.
//!
//! ## Invariants
//!
//! - Item ids are monotonic, assigned from a durable counter, and never
//!   reused within a store
//! - `retry_count` only grows until the item is deleted on delivery
//! - `Processing` is never observed as durable across a restart: anything
//!   found in that state on open is reset to `Pending`
//! - Per tenant, items drain in `created_at` order (id as tiebreak)

use bridge_traits::{Clock, Operation};
use core_store::{Collection, LocalStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// Retry cap; at this count an item needs manual requeueing
pub const MAX_RETRIES: u32 = 3;

/// Durable counter backing id assignment
const NEXT_ID_FLAG: &str = "sync_queue.next_id";

/// Queue item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    /// Awaiting delivery
    Pending,
    /// Picked up by the current drain; transient, never durable
    Processing,
    /// Retry cap reached, excluded from automatic drains
    Failed,
}

impl QueueItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Failed => "failed",
        }
    }
}

/// One queued mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    /// Monotonic queue id
    pub id: u64,
    pub tenant_id: String,
    pub operation: Operation,
    pub collection: Collection,
    /// The record (or for deletes, at least its id) as sent to the remote
    pub payload: Value,
    /// Epoch milliseconds at enqueue; drain order key
    pub created_at: i64,
    pub retry_count: u32,
    pub status: QueueItemStatus,
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    /// Whether this item is eligible for an automatic drain
    pub fn is_eligible(&self) -> bool {
        matches!(
            self.status,
            QueueItemStatus::Pending | QueueItemStatus::Failed
        ) && self.retry_count < MAX_RETRIES
    }
}

/// Durable mutation queue persisted inside the local store
pub struct SyncQueue {
    store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    /// Serializes id assignment against the durable counter
    enqueue_lock: Mutex<()>,
}

impl SyncQueue {
    /// Open the queue over `store`, running crash recovery.
    ///
    /// Any item persisted as `Processing` (a drain was interrupted) is reset
    /// to `Pending`; the id counter resumes past both the stored counter and
    /// the highest existing id, so ids stay monotonic even after the counter
    /// flag is lost in an engine migration.
    pub async fn open(store: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let items = load_items(store.as_ref(), None).await?;

        let max_id = items.iter().map(|i| i.id).max().unwrap_or(0);
        let stored_next: u64 = store
            .get_flag(NEXT_ID_FLAG)
            .await
            .map_err(SyncError::Store)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        let next_id = stored_next.max(max_id + 1);

        let mut recovered = 0;
        for mut item in items {
            if item.status == QueueItemStatus::Processing {
                item.status = QueueItemStatus::Pending;
                persist_item(store.as_ref(), &item).await?;
                recovered += 1;
            }
        }
        if recovered > 0 {
            info!(
                recovered = recovered,
                "Reset interrupted queue items to pending"
            );
        }

        Ok(Self {
            store,
            clock,
            next_id: AtomicU64::new(next_id),
            enqueue_lock: Mutex::new(()),
        })
    }

    /// Append a mutation to the queue.
    ///
    /// Fails loudly when storage is unavailable; the caller must not drop
    /// the mutation silently.
    pub async fn enqueue(
        &self,
        operation: Operation,
        collection: Collection,
        payload: Value,
        tenant_id: &str,
    ) -> Result<u64> {
        let _guard = self.enqueue_lock.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        // Counter first: a crash between the two writes skips an id, which
        // keeps monotonicity; the reverse order could reuse one
        self.store
            .set_flag(NEXT_ID_FLAG, &(id + 1).to_string())
            .await
            .map_err(SyncError::Store)?;

        let item = SyncQueueItem {
            id,
            tenant_id: tenant_id.to_string(),
            operation,
            collection,
            payload,
            created_at: self.clock.unix_timestamp_millis(),
            retry_count: 0,
            status: QueueItemStatus::Pending,
            last_error: None,
        };
        persist_item(self.store.as_ref(), &item).await?;

        debug!(
            item_id = id,
            collection = %collection,
            operation = %operation,
            tenant_id = tenant_id,
            "Enqueued mutation"
        );
        Ok(id)
    }

    /// Eligible items in drain order, optionally scoped to one tenant
    pub async fn pending(&self, tenant_id: Option<&str>) -> Result<Vec<SyncQueueItem>> {
        let mut items: Vec<_> = load_items(self.store.as_ref(), tenant_id)
            .await?
            .into_iter()
            .filter(SyncQueueItem::is_eligible)
            .collect();
        items.sort_by_key(|i| (i.created_at, i.id));
        Ok(items)
    }

    /// Every undelivered item, including capped failures
    pub async fn len(&self, tenant_id: Option<&str>) -> Result<u64> {
        Ok(load_items(self.store.as_ref(), tenant_id).await?.len() as u64)
    }

    /// Items that exhausted their retries and need manual intervention
    pub async fn failed(&self, tenant_id: Option<&str>) -> Result<Vec<SyncQueueItem>> {
        Ok(load_items(self.store.as_ref(), tenant_id)
            .await?
            .into_iter()
            .filter(|i| i.status == QueueItemStatus::Failed)
            .collect())
    }

    /// Fetch one item
    pub async fn get(&self, id: u64) -> Result<Option<SyncQueueItem>> {
        let value = self
            .store
            .get(Collection::SyncQueue, &id.to_string())
            .await
            .map_err(SyncError::Store)?;
        value.map(parse_item).transpose()
    }

    async fn get_required(&self, id: u64) -> Result<SyncQueueItem> {
        self.get(id)
            .await?
            .ok_or(SyncError::ItemNotFound { item_id: id })
    }

    /// Claim an item for the current drain
    pub async fn mark_processing(&self, id: u64) -> Result<()> {
        let mut item = self.get_required(id).await?;
        item.status = QueueItemStatus::Processing;
        persist_item(self.store.as_ref(), &item).await
    }

    /// Confirmed delivery: the item leaves the queue
    pub async fn mark_succeeded(&self, id: u64) -> Result<()> {
        self.store
            .delete(Collection::SyncQueue, &id.to_string())
            .await
            .map_err(SyncError::Store)?;
        debug!(item_id = id, "Queue item delivered and removed");
        Ok(())
    }

    /// Record a delivery failure; caps out at [`MAX_RETRIES`]
    pub async fn mark_failed(&self, id: u64, error: &str) -> Result<()> {
        let mut item = self.get_required(id).await?;
        item.retry_count += 1;
        item.last_error = Some(error.to_string());
        item.status = if item.retry_count >= MAX_RETRIES {
            QueueItemStatus::Failed
        } else {
            QueueItemStatus::Pending
        };
        persist_item(self.store.as_ref(), &item).await?;

        if item.status == QueueItemStatus::Failed {
            warn!(
                item_id = id,
                retry_count = item.retry_count,
                error = error,
                "Queue item failed permanently, manual requeue required"
            );
        } else {
            warn!(
                item_id = id,
                retry_count = item.retry_count,
                error = error,
                "Queue item failed, will retry"
            );
        }
        Ok(())
    }

    /// Put a permanently failed item back into rotation after operator
    /// intervention
    pub async fn requeue_failed(&self, id: u64) -> Result<()> {
        let mut item = self.get_required(id).await?;
        item.status = QueueItemStatus::Pending;
        item.retry_count = 0;
        item.last_error = None;
        persist_item(self.store.as_ref(), &item).await?;
        info!(item_id = id, "Requeued failed item");
        Ok(())
    }
}

async fn load_items(
    store: &dyn LocalStore,
    tenant_id: Option<&str>,
) -> Result<Vec<SyncQueueItem>> {
    let values = match tenant_id {
        Some(tenant) => store.query(Collection::SyncQueue, tenant).await,
        None => store.scan(Collection::SyncQueue).await,
    }
    .map_err(SyncError::Store)?;

    values.into_iter().map(parse_item).collect()
}

fn parse_item(value: Value) -> Result<SyncQueueItem> {
    Ok(serde_json::from_value(value)?)
}

async fn persist_item(store: &dyn LocalStore, item: &SyncQueueItem) -> Result<()> {
    let value = serde_json::to_value(item)?;
    store
        .upsert(Collection::SyncQueue, &[value])
        .await
        .map_err(SyncError::Store)
}
