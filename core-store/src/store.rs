//! The backend-agnostic store contract and the composition-time factory.

use crate::document::DocumentStore;
use crate::error::{Result, StoreError};
use crate::models::Collection;
use crate::relational::SqliteStore;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Embedded persistence contract shared by both engines.
///
/// Records are JSON objects carrying a string `id` and a string `tenant_id`;
/// the typed structs in [`crate::models`] define the shape per collection.
/// Queue items additionally allow a numeric `id` (the monotonic queue id).
/// Violations fail loudly with [`StoreError::InvalidRecord`] so a mutation is
/// never silently dropped.
#[async_trait::async_trait]
pub trait LocalStore: Send + Sync {
    /// Fetch a single record by id
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Fetch every record of one tenant, backed by a tenant index
    async fn query(&self, collection: Collection, tenant_id: &str) -> Result<Vec<Value>>;

    /// Fetch every record across tenants (used by the migrator)
    async fn scan(&self, collection: Collection) -> Result<Vec<Value>>;

    /// Insert or replace records, keyed by id
    async fn upsert(&self, collection: Collection, records: &[Value]) -> Result<()>;

    /// Remove a record by id; removing a missing record is not an error
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    /// Remove every record of one tenant, atomically per collection
    async fn clear_tenant(&self, tenant_id: &str) -> Result<()>;

    /// Read a durable flag scoped to this store
    async fn get_flag(&self, key: &str) -> Result<Option<String>>;

    /// Write a durable flag scoped to this store
    async fn set_flag(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a durable flag
    async fn delete_flag(&self, key: &str) -> Result<()>;

    /// Delete all data held by this engine. Backs the explicit legacy-store
    /// cleanup after a migration; never invoked automatically.
    async fn wipe(&self) -> Result<()>;
}

/// Extract the `(id, tenant_id)` key pair of a record, validating shape.
///
/// Queue items carry numeric ids; those are keyed by their decimal string.
pub fn record_key(collection: Collection, record: &Value) -> Result<(String, String)> {
    let invalid = |message: &str| StoreError::InvalidRecord {
        collection: collection.as_str().to_string(),
        message: message.to_string(),
    };

    let id = match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(invalid("missing or empty id field")),
    };

    let tenant_id = record
        .get("tenant_id")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid("missing or empty tenant_id field"))?
        .to_string();

    Ok((id, tenant_id))
}

/// Which embedded engine backs the store; read once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON document files, cheap writes
    Document,
    /// SQLite with typed columns and transactions
    Relational,
}

impl std::str::FromStr for StoreBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "document" => Ok(Self::Document),
            "relational" => Ok(Self::Relational),
            _ => Err(StoreError::UnknownBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Document => "document",
            Self::Relational => "relational",
        })
    }
}

/// Open the configured backend under `data_dir`.
///
/// Initialization failure is fatal and propagates; there is deliberately no
/// fallback to the other engine.
pub async fn open_store(backend: StoreBackend, data_dir: &Path) -> Result<Arc<dyn LocalStore>> {
    match backend {
        StoreBackend::Document => {
            let store = DocumentStore::open(data_dir.join("documents")).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Relational => {
            let store = SqliteStore::open(data_dir.join("store.db")).await?;
            Ok(Arc::new(store))
        }
    }
}
