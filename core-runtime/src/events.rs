//! # Event Bus System
//!
//! Decoupled communication between core modules via `tokio::sync::broadcast`.
//! Sync, network and migration services emit typed events; the host UI and
//! any observers subscribe independently.
//!
//! Subscribers that fall behind receive `RecvError::Lagged(n)` and can keep
//! consuming; `RecvError::Closed` signals shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum encompassing all event categories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync-queue and drain events
    Sync(SyncEvent),
    /// Connectivity events
    Network(NetworkEvent),
    /// Store-migration events
    Migration(MigrationEvent),
}

/// Events emitted by the sync manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A drain pass began
    DrainStarted {
        /// Eligible items at the start of the pass
        pending: u64,
    },
    /// One queue item reached the remote service
    ItemDelivered {
        item_id: u64,
        collection: String,
        tenant_id: String,
    },
    /// One queue item failed to deliver
    ItemFailed {
        item_id: u64,
        collection: String,
        retry_count: u32,
        message: String,
    },
    /// A drain pass finished
    DrainFinished {
        delivered: u64,
        failed: u64,
        /// Items still awaiting delivery after the pass
        pending: u64,
    },
}

/// Events emitted by the network monitor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NetworkEvent {
    /// Connectivity or quality changed
    StatusChanged {
        status: String,
        quality: String,
        latency_ms: Option<u32>,
    },
}

/// Events emitted by the store migrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MigrationEvent {
    /// One collection finished transferring
    CollectionMigrated { collection: String, records: u64 },
    /// One collection failed; migration continues
    CollectionFailed { collection: String, message: String },
    /// The whole run finished and was marked complete
    Completed { total_records: u64, failures: u64 },
}

/// Central event bus for publishing and subscribing to events.
///
/// Cloning shares the underlying channel; each `subscribe()` creates an
/// independent receiver that sees all future events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create an event bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers, or an error when nobody listens;
    /// emitters treat that as non-fatal and `.ok()` it.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Create a new independent subscriber
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
