use bridge_traits::RemoteError;
use core_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Queue item {item_id} not found")]
    ItemNotFound { item_id: u64 },

    #[error("Malformed queue item: {0}")]
    MalformedItem(#[from] serde_json::Error),

    #[error("Collection {0} is not syncable")]
    NotSyncable(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
