//! # Sync Module
//!
//! Queues local mutations durably and replays them against the remote
//! service once it is reachable.
//!
//! ## Components
//!
//! - **Sync Queue** (`queue`): durable, tenant-scoped, ordered mutation log
//!   persisted inside the local store, with bounded retries and
//!   crash recovery
//! - **Handler Registry** (`registry`): compile-time-checked mapping from
//!   each collection to its delivery and sync-metadata behavior
//! - **Sync Manager** (`manager`): drains the queue sequentially, reacting
//!   to enqueues, connectivity transitions and a periodic timer, and
//!   publishes `(status, pending)` snapshots to subscribers

pub mod error;
pub mod manager;
pub mod queue;
pub mod registry;

pub use error::{Result, SyncError};
pub use manager::{DrainSummary, SyncManager, SyncOptions, SyncSnapshot, SyncStatus};
pub use queue::{QueueItemStatus, SyncQueue, SyncQueueItem, MAX_RETRIES};
pub use registry::{handler_for, CollectionHandler};
