//! Document-engine backend: one JSON file per collection.
//!
//! The whole dataset is loaded into memory on open and kept there; every
//! mutation rewrites the owning collection file through a temp-file rename,
//! so a crash mid-write leaves the previous file intact. There are no
//! cross-collection transactions; `clear_tenant` is atomic per collection
//! only.

use crate::error::Result;
use crate::models::Collection;
use crate::store::{record_key, LocalStore};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

const FLAGS_FILE: &str = "flags.json";

type CollectionMap = BTreeMap<String, Value>;

/// JSON-file-backed document store
pub struct DocumentStore {
    dir: PathBuf,
    collections: RwLock<HashMap<Collection, CollectionMap>>,
    flags: RwLock<BTreeMap<String, String>>,
}

impl DocumentStore {
    /// Open (or create) a document store rooted at `dir`.
    ///
    /// Unreadable or corrupt collection files fail the open; the caller
    /// decides what to do, the store never guesses.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut collections = HashMap::new();
        for collection in Collection::ALL {
            let map = load_json(&dir.join(collection_file(collection)))
                .await?
                .unwrap_or_default();
            collections.insert(collection, map);
        }

        let flags = load_json(&dir.join(FLAGS_FILE)).await?.unwrap_or_default();

        info!(dir = %dir.display(), "Opened document store");
        Ok(Self {
            dir,
            collections: RwLock::new(collections),
            flags: RwLock::new(flags),
        })
    }

    async fn persist_collection(&self, collection: Collection, map: &CollectionMap) -> Result<()> {
        write_json_atomic(&self.dir.join(collection_file(collection)), map).await
    }

    async fn persist_flags(&self, flags: &BTreeMap<String, String>) -> Result<()> {
        write_json_atomic(&self.dir.join(FLAGS_FILE), flags).await
    }
}

fn collection_file(collection: Collection) -> String {
    format!("{}.json", collection.as_str())
}

async fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via temp file + rename so readers never observe a torn file.
async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait::async_trait]
impl LocalStore for DocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|map| map.get(id))
            .cloned())
    }

    async fn query(&self, collection: Collection, tenant_id: &str) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        let records = collections
            .get(&collection)
            .map(|map| {
                map.values()
                    .filter(|r| r.get("tenant_id").and_then(Value::as_str) == Some(tenant_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, collection: Collection, records: &[Value]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;
        let map = collections.entry(collection).or_default();
        for record in records {
            let (id, _) = record_key(collection, record)?;
            map.insert(id, record.clone());
        }

        self.persist_collection(collection, map).await?;
        debug!(collection = %collection, count = records.len(), "Upserted records");
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let map = collections.entry(collection).or_default();
        if map.remove(id).is_some() {
            self.persist_collection(collection, map).await?;
        }
        Ok(())
    }

    async fn clear_tenant(&self, tenant_id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        for collection in Collection::ALL {
            let map = collections.entry(collection).or_default();
            let before = map.len();
            map.retain(|_, r| r.get("tenant_id").and_then(Value::as_str) != Some(tenant_id));
            if map.len() != before {
                self.persist_collection(collection, map).await?;
            }
        }
        info!(tenant_id = tenant_id, "Cleared tenant from document store");
        Ok(())
    }

    async fn get_flag(&self, key: &str) -> Result<Option<String>> {
        Ok(self.flags.read().await.get(key).cloned())
    }

    async fn set_flag(&self, key: &str, value: &str) -> Result<()> {
        let mut flags = self.flags.write().await;
        flags.insert(key.to_string(), value.to_string());
        self.persist_flags(&flags).await
    }

    async fn delete_flag(&self, key: &str) -> Result<()> {
        let mut flags = self.flags.write().await;
        if flags.remove(key).is_some() {
            self.persist_flags(&flags).await?;
        }
        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        let mut collections = self.collections.write().await;
        let mut flags = self.flags.write().await;

        for collection in Collection::ALL {
            collections.insert(collection, CollectionMap::new());
            remove_if_exists(&self.dir.join(collection_file(collection))).await?;
        }
        flags.clear();
        remove_if_exists(&self.dir.join(FLAGS_FILE)).await?;

        info!(dir = %self.dir.display(), "Wiped document store");
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;

    async fn open_temp() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("documents"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upsert_get_delete() {
        let (_dir, store) = open_temp().await;

        let record = json!({"id": "p1", "tenant_id": "t1", "name": "Chalk", "price_cents": 150});
        store
            .upsert(Collection::Products, std::slice::from_ref(&record))
            .await
            .unwrap();

        let fetched = store.get(Collection::Products, "p1").await.unwrap();
        assert_eq!(fetched, Some(record));

        store.delete(Collection::Products, "p1").await.unwrap();
        assert_eq!(store.get(Collection::Products, "p1").await.unwrap(), None);

        // Deleting again is a no-op
        store.delete(Collection::Products, "p1").await.unwrap();
    }

    #[tokio::test]
    async fn test_query_filters_by_tenant() {
        let (_dir, store) = open_temp().await;

        store
            .upsert(
                Collection::Students,
                &[
                    json!({"id": "st1", "tenant_id": "school-a", "name": "Amina"}),
                    json!({"id": "st2", "tenant_id": "school-b", "name": "Bilal"}),
                    json!({"id": "st3", "tenant_id": "school-a", "name": "Chen"}),
                ],
            )
            .await
            .unwrap();

        let a = store.query(Collection::Students, "school-a").await.unwrap();
        assert_eq!(a.len(), 2);
        let all = store.scan(Collection::Students).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let (_dir, store) = open_temp().await;

        store
            .upsert(
                Collection::Products,
                &[json!({"id": "p1", "tenant_id": "t1", "name": "Chalk", "stock": 5})],
            )
            .await
            .unwrap();
        store
            .upsert(
                Collection::Products,
                &[json!({"id": "p1", "tenant_id": "t1", "name": "Chalk", "stock": 4})],
            )
            .await
            .unwrap();

        let records = store.scan(Collection::Products).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["stock"], 4);
    }

    #[tokio::test]
    async fn test_invalid_record_rejected() {
        let (_dir, store) = open_temp().await;

        let err = store
            .upsert(Collection::Products, &[json!({"name": "no ids"})])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn test_clear_tenant() {
        let (_dir, store) = open_temp().await;

        store
            .upsert(
                Collection::Sales,
                &[
                    json!({"id": "s1", "tenant_id": "t1", "total_cents": 100}),
                    json!({"id": "s2", "tenant_id": "t2", "total_cents": 200}),
                ],
            )
            .await
            .unwrap();
        store
            .upsert(
                Collection::Customers,
                &[json!({"id": "c1", "tenant_id": "t1", "name": "Dara"})],
            )
            .await
            .unwrap();

        store.clear_tenant("t1").await.unwrap();

        assert!(store.query(Collection::Sales, "t1").await.unwrap().is_empty());
        assert!(store
            .query(Collection::Customers, "t1")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.query(Collection::Sales, "t2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flags() {
        let (_dir, store) = open_temp().await;

        assert_eq!(store.get_flag("cursor").await.unwrap(), None);
        store.set_flag("cursor", "41").await.unwrap();
        store.set_flag("cursor", "42").await.unwrap();
        assert_eq!(store.get_flag("cursor").await.unwrap(), Some("42".into()));
        store.delete_flag("cursor").await.unwrap();
        assert_eq!(store.get_flag("cursor").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents");

        {
            let store = DocumentStore::open(&path).await.unwrap();
            store
                .upsert(
                    Collection::Classes,
                    &[json!({"id": "k1", "tenant_id": "t1", "name": "Grade 4"})],
                )
                .await
                .unwrap();
            store.set_flag("schema", "1").await.unwrap();
        }

        let store = DocumentStore::open(&path).await.unwrap();
        assert!(store.get(Collection::Classes, "k1").await.unwrap().is_some());
        assert_eq!(store.get_flag("schema").await.unwrap(), Some("1".into()));
    }

    #[tokio::test]
    async fn test_wipe_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents");

        let store = DocumentStore::open(&path).await.unwrap();
        store
            .upsert(
                Collection::Products,
                &[json!({"id": "p1", "tenant_id": "t1", "name": "Chalk"})],
            )
            .await
            .unwrap();
        store.set_flag("cursor", "7").await.unwrap();

        store.wipe().await.unwrap();
        assert!(store.scan(Collection::Products).await.unwrap().is_empty());
        assert_eq!(store.get_flag("cursor").await.unwrap(), None);

        // A reopen sees the wiped state, not stale files
        drop(store);
        let store = DocumentStore::open(&path).await.unwrap();
        assert!(store.scan(Collection::Products).await.unwrap().is_empty());
    }
}
