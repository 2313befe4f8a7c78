//! Relational backend: SQLite via sqlx with typed columns.
//!
//! Each collection gets its own table with a tenant index plus
//! foreign-key-shaped indexes on the reference columns; writes go through
//! `INSERT ... ON CONFLICT DO UPDATE`, and multi-record operations run in a
//! single transaction.

use crate::db::{create_pool, create_test_pool, DatabaseConfig};
use crate::error::{Result, StoreError};
use crate::models::{Collection, Customer, Product, Sale, SaleItem, SchoolClass, Student};
use crate::store::LocalStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        name TEXT NOT NULL,
        sku TEXT,
        price_cents INTEGER NOT NULL,
        stock INTEGER NOT NULL DEFAULT 0,
        synced_at INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        name TEXT NOT NULL,
        phone TEXT,
        email TEXT,
        synced_at INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sales (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        customer_id TEXT,
        total_cents INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        synced INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sale_items (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        sale_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price_cents INTEGER NOT NULL,
        synced INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        name TEXT NOT NULL,
        class_id TEXT,
        guardian_phone TEXT,
        synced_at INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS classes (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        name TEXT NOT NULL,
        teacher_name TEXT,
        synced_at INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_queue (
        id INTEGER PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        operation TEXT NOT NULL,
        collection TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        last_error TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS flags (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_tenant ON products(tenant_id)",
    "CREATE INDEX IF NOT EXISTS idx_customers_tenant ON customers(tenant_id)",
    "CREATE INDEX IF NOT EXISTS idx_sales_tenant ON sales(tenant_id)",
    "CREATE INDEX IF NOT EXISTS idx_sale_items_tenant ON sale_items(tenant_id)",
    "CREATE INDEX IF NOT EXISTS idx_sale_items_sale ON sale_items(sale_id)",
    "CREATE INDEX IF NOT EXISTS idx_students_tenant ON students(tenant_id)",
    "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
    "CREATE INDEX IF NOT EXISTS idx_classes_tenant ON classes(tenant_id)",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_tenant_created ON sync_queue(tenant_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_status ON sync_queue(status)",
];

/// Queue items cross the generic store seam as JSON; this is their typed
/// shape on the relational side.
#[derive(Debug, Serialize, Deserialize)]
struct QueueRecord {
    id: i64,
    tenant_id: String,
    operation: String,
    collection: String,
    payload: Value,
    created_at: i64,
    retry_count: i64,
    status: String,
    last_error: Option<String>,
}

/// SQLite implementation of [`LocalStore`]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and ensure the schema
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let path = db_path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = create_pool(DatabaseConfig::file(&path)).await?;
        let store = Self { pool };
        store.initialize().await?;

        info!(path = %path.display(), "Opened relational store");
        Ok(store)
    }

    /// In-memory store for tests
    pub async fn in_memory() -> Result<Self> {
        let pool = create_test_pool().await?;
        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn decode_record(collection: Collection, record: &Value) -> Result<DecodedRecord> {
        let invalid = |e: serde_json::Error| StoreError::InvalidRecord {
            collection: collection.as_str().to_string(),
            message: e.to_string(),
        };

        Ok(match collection {
            Collection::Products => {
                DecodedRecord::Product(serde_json::from_value(record.clone()).map_err(invalid)?)
            }
            Collection::Customers => {
                DecodedRecord::Customer(serde_json::from_value(record.clone()).map_err(invalid)?)
            }
            Collection::Sales => {
                DecodedRecord::Sale(serde_json::from_value(record.clone()).map_err(invalid)?)
            }
            Collection::SaleItems => {
                DecodedRecord::SaleItem(serde_json::from_value(record.clone()).map_err(invalid)?)
            }
            Collection::Students => {
                DecodedRecord::Student(serde_json::from_value(record.clone()).map_err(invalid)?)
            }
            Collection::Classes => {
                DecodedRecord::Class(serde_json::from_value(record.clone()).map_err(invalid)?)
            }
            Collection::SyncQueue => {
                DecodedRecord::Queue(serde_json::from_value(record.clone()).map_err(invalid)?)
            }
        })
    }

    async fn upsert_decoded(
        tx: &mut Transaction<'_, Sqlite>,
        record: DecodedRecord,
    ) -> Result<()> {
        match record {
            DecodedRecord::Product(p) => {
                sqlx::query(
                    r#"
                    INSERT INTO products (id, tenant_id, name, sku, price_cents, stock, synced_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        tenant_id = excluded.tenant_id,
                        name = excluded.name,
                        sku = excluded.sku,
                        price_cents = excluded.price_cents,
                        stock = excluded.stock,
                        synced_at = excluded.synced_at
                    "#,
                )
                .bind(&p.id)
                .bind(&p.tenant_id)
                .bind(&p.name)
                .bind(&p.sku)
                .bind(p.price_cents)
                .bind(p.stock)
                .bind(p.synced_at)
                .execute(&mut **tx)
                .await?;
            }
            DecodedRecord::Customer(c) => {
                sqlx::query(
                    r#"
                    INSERT INTO customers (id, tenant_id, name, phone, email, synced_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        tenant_id = excluded.tenant_id,
                        name = excluded.name,
                        phone = excluded.phone,
                        email = excluded.email,
                        synced_at = excluded.synced_at
                    "#,
                )
                .bind(&c.id)
                .bind(&c.tenant_id)
                .bind(&c.name)
                .bind(&c.phone)
                .bind(&c.email)
                .bind(c.synced_at)
                .execute(&mut **tx)
                .await?;
            }
            DecodedRecord::Sale(s) => {
                sqlx::query(
                    r#"
                    INSERT INTO sales (id, tenant_id, customer_id, total_cents, created_at, synced)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        tenant_id = excluded.tenant_id,
                        customer_id = excluded.customer_id,
                        total_cents = excluded.total_cents,
                        created_at = excluded.created_at,
                        synced = excluded.synced
                    "#,
                )
                .bind(&s.id)
                .bind(&s.tenant_id)
                .bind(&s.customer_id)
                .bind(s.total_cents)
                .bind(s.created_at)
                .bind(s.synced)
                .execute(&mut **tx)
                .await?;
            }
            DecodedRecord::SaleItem(i) => {
                sqlx::query(
                    r#"
                    INSERT INTO sale_items
                        (id, tenant_id, sale_id, product_id, quantity, unit_price_cents, synced)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        tenant_id = excluded.tenant_id,
                        sale_id = excluded.sale_id,
                        product_id = excluded.product_id,
                        quantity = excluded.quantity,
                        unit_price_cents = excluded.unit_price_cents,
                        synced = excluded.synced
                    "#,
                )
                .bind(&i.id)
                .bind(&i.tenant_id)
                .bind(&i.sale_id)
                .bind(&i.product_id)
                .bind(i.quantity)
                .bind(i.unit_price_cents)
                .bind(i.synced)
                .execute(&mut **tx)
                .await?;
            }
            DecodedRecord::Student(s) => {
                sqlx::query(
                    r#"
                    INSERT INTO students (id, tenant_id, name, class_id, guardian_phone, synced_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        tenant_id = excluded.tenant_id,
                        name = excluded.name,
                        class_id = excluded.class_id,
                        guardian_phone = excluded.guardian_phone,
                        synced_at = excluded.synced_at
                    "#,
                )
                .bind(&s.id)
                .bind(&s.tenant_id)
                .bind(&s.name)
                .bind(&s.class_id)
                .bind(&s.guardian_phone)
                .bind(s.synced_at)
                .execute(&mut **tx)
                .await?;
            }
            DecodedRecord::Class(c) => {
                sqlx::query(
                    r#"
                    INSERT INTO classes (id, tenant_id, name, teacher_name, synced_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        tenant_id = excluded.tenant_id,
                        name = excluded.name,
                        teacher_name = excluded.teacher_name,
                        synced_at = excluded.synced_at
                    "#,
                )
                .bind(&c.id)
                .bind(&c.tenant_id)
                .bind(&c.name)
                .bind(&c.teacher_name)
                .bind(c.synced_at)
                .execute(&mut **tx)
                .await?;
            }
            DecodedRecord::Queue(q) => {
                let payload = serde_json::to_string(&q.payload)?;
                sqlx::query(
                    r#"
                    INSERT INTO sync_queue
                        (id, tenant_id, operation, collection, payload,
                         created_at, retry_count, status, last_error)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        tenant_id = excluded.tenant_id,
                        operation = excluded.operation,
                        collection = excluded.collection,
                        payload = excluded.payload,
                        created_at = excluded.created_at,
                        retry_count = excluded.retry_count,
                        status = excluded.status,
                        last_error = excluded.last_error
                    "#,
                )
                .bind(q.id)
                .bind(&q.tenant_id)
                .bind(&q.operation)
                .bind(&q.collection)
                .bind(payload)
                .bind(q.created_at)
                .bind(q.retry_count)
                .bind(&q.status)
                .bind(&q.last_error)
                .execute(&mut **tx)
                .await?;
            }
        }

        Ok(())
    }

    fn row_to_value(collection: Collection, row: &SqliteRow) -> Result<Value> {
        let value = match collection {
            Collection::Products => serde_json::to_value(Product {
                id: row.try_get("id")?,
                tenant_id: row.try_get("tenant_id")?,
                name: row.try_get("name")?,
                sku: row.try_get("sku")?,
                price_cents: row.try_get("price_cents")?,
                stock: row.try_get("stock")?,
                synced_at: row.try_get("synced_at")?,
            })?,
            Collection::Customers => serde_json::to_value(Customer {
                id: row.try_get("id")?,
                tenant_id: row.try_get("tenant_id")?,
                name: row.try_get("name")?,
                phone: row.try_get("phone")?,
                email: row.try_get("email")?,
                synced_at: row.try_get("synced_at")?,
            })?,
            Collection::Sales => serde_json::to_value(Sale {
                id: row.try_get("id")?,
                tenant_id: row.try_get("tenant_id")?,
                customer_id: row.try_get("customer_id")?,
                total_cents: row.try_get("total_cents")?,
                created_at: row.try_get("created_at")?,
                synced: row.try_get("synced")?,
            })?,
            Collection::SaleItems => serde_json::to_value(SaleItem {
                id: row.try_get("id")?,
                tenant_id: row.try_get("tenant_id")?,
                sale_id: row.try_get("sale_id")?,
                product_id: row.try_get("product_id")?,
                quantity: row.try_get("quantity")?,
                unit_price_cents: row.try_get("unit_price_cents")?,
                synced: row.try_get("synced")?,
            })?,
            Collection::Students => serde_json::to_value(Student {
                id: row.try_get("id")?,
                tenant_id: row.try_get("tenant_id")?,
                name: row.try_get("name")?,
                class_id: row.try_get("class_id")?,
                guardian_phone: row.try_get("guardian_phone")?,
                synced_at: row.try_get("synced_at")?,
            })?,
            Collection::Classes => serde_json::to_value(SchoolClass {
                id: row.try_get("id")?,
                tenant_id: row.try_get("tenant_id")?,
                name: row.try_get("name")?,
                teacher_name: row.try_get("teacher_name")?,
                synced_at: row.try_get("synced_at")?,
            })?,
            Collection::SyncQueue => {
                let payload_text: String = row.try_get("payload")?;
                serde_json::to_value(QueueRecord {
                    id: row.try_get("id")?,
                    tenant_id: row.try_get("tenant_id")?,
                    operation: row.try_get("operation")?,
                    collection: row.try_get("collection")?,
                    payload: serde_json::from_str(&payload_text)?,
                    created_at: row.try_get("created_at")?,
                    retry_count: row.try_get("retry_count")?,
                    status: row.try_get("status")?,
                    last_error: row.try_get("last_error")?,
                })?
            }
        };

        Ok(value)
    }

    fn rows_to_values(collection: Collection, rows: Vec<SqliteRow>) -> Result<Vec<Value>> {
        rows.iter()
            .map(|row| Self::row_to_value(collection, row))
            .collect()
    }
}

#[async_trait::async_trait]
impl LocalStore for SqliteStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", collection.as_str());

        let row = if collection == Collection::SyncQueue {
            let Ok(numeric_id) = id.parse::<i64>() else {
                return Ok(None);
            };
            sqlx::query(&sql)
                .bind(numeric_id)
                .fetch_optional(&self.pool)
                .await?
        } else {
            sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?
        };

        row.map(|r| Self::row_to_value(collection, &r)).transpose()
    }

    async fn query(&self, collection: Collection, tenant_id: &str) -> Result<Vec<Value>> {
        let sql = format!(
            "SELECT * FROM {} WHERE tenant_id = ? ORDER BY id",
            collection.as_str()
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        Self::rows_to_values(collection, rows)
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<Value>> {
        let sql = format!("SELECT * FROM {} ORDER BY id", collection.as_str());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Self::rows_to_values(collection, rows)
    }

    async fn upsert(&self, collection: Collection, records: &[Value]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Decode everything up front so a malformed record aborts the batch
        // before any row is written.
        let decoded = records
            .iter()
            .map(|r| Self::decode_record(collection, r))
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await?;
        for record in decoded {
            Self::upsert_decoded(&mut tx, record).await?;
        }
        tx.commit().await?;

        debug!(collection = %collection, count = records.len(), "Upserted records");
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", collection.as_str());

        if collection == Collection::SyncQueue {
            let Ok(numeric_id) = id.parse::<i64>() else {
                return Ok(());
            };
            sqlx::query(&sql).bind(numeric_id).execute(&self.pool).await?;
        } else {
            sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn clear_tenant(&self, tenant_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for collection in Collection::ALL {
            let sql = format!("DELETE FROM {} WHERE tenant_id = ?", collection.as_str());
            sqlx::query(&sql).bind(tenant_id).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!(tenant_id = tenant_id, "Cleared tenant from relational store");
        Ok(())
    }

    async fn get_flag(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM flags WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn set_flag(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flags (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_flag(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM flags WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for collection in Collection::ALL {
            let sql = format!("DELETE FROM {}", collection.as_str());
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM flags").execute(&mut *tx).await?;
        tx.commit().await?;

        info!("Wiped relational store");
        Ok(())
    }
}

enum DecodedRecord {
    Product(Product),
    Customer(Customer),
    Sale(Sale),
    SaleItem(SaleItem),
    Student(Student),
    Class(SchoolClass),
    Queue(QueueRecord),
}
