//! # Collection Handler Registry
//!
//! Statically-checked dispatch from a collection to its sync behavior.
//! Adding a collection means adding an enum variant and a match arm here;
//! the compiler finds every place that needs updating. No string-keyed
//! dispatch anywhere in the drain loop.

use bridge_traits::{Operation, RemoteBackend, RemoteError};
use core_store::{record_key, Collection, LocalStore, StoreError};
use serde_json::{json, Value};
use tracing::debug;

/// Per-collection sync capability: how a queued mutation reaches the remote
/// service and what local metadata records the confirmed delivery.
#[async_trait::async_trait]
pub trait CollectionHandler: Send + Sync {
    /// The collection this handler owns
    fn collection(&self) -> Collection;

    /// Deliver one mutation to the remote service
    async fn deliver(
        &self,
        remote: &dyn RemoteBackend,
        operation: Operation,
        payload: &Value,
    ) -> Result<(), RemoteError> {
        remote
            .apply(self.collection().as_str(), operation, payload)
            .await
    }

    /// Record the confirmed delivery on the local copy.
    ///
    /// The local record is re-read rather than taken from the payload: the
    /// application may have updated it while the item sat in the queue.
    async fn on_delivered(
        &self,
        store: &dyn LocalStore,
        operation: Operation,
        payload: &Value,
        now_ms: i64,
    ) -> Result<(), StoreError>;
}

/// Handler for sale-like collections carrying the boolean `synced` flag
struct SaleLikeHandler {
    collection: Collection,
}

#[async_trait::async_trait]
impl CollectionHandler for SaleLikeHandler {
    fn collection(&self) -> Collection {
        self.collection
    }

    async fn on_delivered(
        &self,
        store: &dyn LocalStore,
        operation: Operation,
        payload: &Value,
        _now_ms: i64,
    ) -> Result<(), StoreError> {
        if operation == Operation::Delete {
            return Ok(());
        }

        let (id, _) = record_key(self.collection, payload)?;
        let Some(mut record) = store.get(self.collection, &id).await? else {
            debug!(collection = %self.collection, id = id, "Record gone before sync flag write");
            return Ok(());
        };

        record["synced"] = json!(true);
        store.upsert(self.collection, &[record]).await
    }
}

/// Handler for reference collections stamping `synced_at`
struct ReferenceHandler {
    collection: Collection,
}

#[async_trait::async_trait]
impl CollectionHandler for ReferenceHandler {
    fn collection(&self) -> Collection {
        self.collection
    }

    async fn on_delivered(
        &self,
        store: &dyn LocalStore,
        operation: Operation,
        payload: &Value,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        if operation == Operation::Delete {
            return Ok(());
        }

        let (id, _) = record_key(self.collection, payload)?;
        let Some(mut record) = store.get(self.collection, &id).await? else {
            debug!(collection = %self.collection, id = id, "Record gone before synced_at write");
            return Ok(());
        };

        record["synced_at"] = json!(now_ms);
        store.upsert(self.collection, &[record]).await
    }
}

static PRODUCTS: ReferenceHandler = ReferenceHandler {
    collection: Collection::Products,
};
static CUSTOMERS: ReferenceHandler = ReferenceHandler {
    collection: Collection::Customers,
};
static SALES: SaleLikeHandler = SaleLikeHandler {
    collection: Collection::Sales,
};
static SALE_ITEMS: SaleLikeHandler = SaleLikeHandler {
    collection: Collection::SaleItems,
};
static STUDENTS: ReferenceHandler = ReferenceHandler {
    collection: Collection::Students,
};
static CLASSES: ReferenceHandler = ReferenceHandler {
    collection: Collection::Classes,
};

/// Resolve the handler for a collection.
///
/// The match is exhaustive over [`Collection`]; the queue itself is the one
/// collection that is not syncable.
pub fn handler_for(collection: Collection) -> Option<&'static dyn CollectionHandler> {
    match collection {
        Collection::Products => Some(&PRODUCTS),
        Collection::Customers => Some(&CUSTOMERS),
        Collection::Sales => Some(&SALES),
        Collection::SaleItems => Some(&SALE_ITEMS),
        Collection::Students => Some(&STUDENTS),
        Collection::Classes => Some(&CLASSES),
        Collection::SyncQueue => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::SqliteStore;
    use std::sync::Arc;

    #[test]
    fn test_every_domain_collection_has_a_handler() {
        for collection in Collection::DOMAIN {
            let handler = handler_for(collection).expect("domain collection must be syncable");
            assert_eq!(handler.collection(), collection);
        }
        assert!(handler_for(Collection::SyncQueue).is_none());
    }

    #[tokio::test]
    async fn test_sale_handler_flips_synced_flag() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let record = json!({
            "id": "s1", "tenant_id": "t1", "customer_id": null,
            "total_cents": 1000, "created_at": 1, "synced": false
        });
        store
            .upsert(Collection::Sales, std::slice::from_ref(&record))
            .await
            .unwrap();

        let handler = handler_for(Collection::Sales).unwrap();
        handler
            .on_delivered(store.as_ref(), Operation::Create, &record, 99)
            .await
            .unwrap();

        let updated = store.get(Collection::Sales, "s1").await.unwrap().unwrap();
        assert_eq!(updated["synced"], true);
    }

    #[tokio::test]
    async fn test_reference_handler_stamps_synced_at() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let record = json!({
            "id": "p1", "tenant_id": "t1", "name": "Chalk",
            "sku": null, "price_cents": 150, "stock": 3, "synced_at": null
        });
        store
            .upsert(Collection::Products, std::slice::from_ref(&record))
            .await
            .unwrap();

        let handler = handler_for(Collection::Products).unwrap();
        handler
            .on_delivered(store.as_ref(), Operation::Update, &record, 1_700_000_000_123)
            .await
            .unwrap();

        let updated = store.get(Collection::Products, "p1").await.unwrap().unwrap();
        assert_eq!(updated["synced_at"], 1_700_000_000_123_i64);
    }

    #[tokio::test]
    async fn test_delete_leaves_no_local_trace() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let handler = handler_for(Collection::Sales).unwrap();

        // Payload of a delete carries only the id; nothing local to touch
        handler
            .on_delivered(
                store.as_ref(),
                Operation::Delete,
                &json!({"id": "s1", "tenant_id": "t1"}),
                99,
            )
            .await
            .unwrap();

        assert_eq!(store.get(Collection::Sales, "s1").await.unwrap(), None);
    }
}
