//! Durable Flag Storage
//!
//! Key/value pairs that must survive a storage-engine switch, most
//! importantly the migration completion marker. Implementations persist
//! outside both swappable store backends.

use crate::error::Result;

/// Durable key/value store that outlives engine switches
#[async_trait::async_trait]
pub trait FlagStore: Send + Sync {
    /// Read a flag, `None` when unset
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write or overwrite a flag
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a flag; removing an unset flag is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Read a flag as a boolean; unset reads as `None`
    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.get(key).await?.map(|v| v == "true"))
    }

    /// Write a boolean flag
    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, if value { "true" } else { "false" }).await
    }
}
