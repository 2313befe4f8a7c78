//! SQLite connection handling for the relational backend.
//!
//! One pool per store: WAL journaling so readers never block the writer,
//! enforced foreign keys, and a connection count sized for an embedded,
//! single-process client rather than a server. The schema is owned by
//! [`SqliteStore`](crate::relational::SqliteStore).

use crate::error::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the database lives
#[derive(Debug, Clone)]
pub enum DatabaseLocation {
    /// A file on disk, created when missing
    File(PathBuf),
    /// A private in-memory database; capped to one connection, since every
    /// SQLite `:memory:` connection is its own empty database
    Memory,
}

/// Pool sizing and patience knobs
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Configuration for a file-backed database
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Configuration for an in-memory database (useful for testing)
    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of connections; ignored for in-memory pools
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open a configured SQLite pool and verify it answers.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    let (connect_options, max_connections) = match &config.location {
        DatabaseLocation::File(path) => {
            info!(path = %path.display(), "Opening store database");
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .foreign_keys(true)
                .pragma("cache_size", "-16000");
            (options, config.max_connections)
        }
        DatabaseLocation::Memory => {
            let options = SqliteConnectOptions::new()
                .in_memory(true)
                .foreign_keys(true);
            (options, 1)
        }
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open store database");
            StoreError::Database(e)
        })?;

    health_check(&pool).await?;
    Ok(pool)
}

/// In-memory pool for tests
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(StoreError::Database)?;
    debug!("Store database answered health check");
    Ok(())
}
