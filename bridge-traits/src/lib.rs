//! # Host Bridge Traits
//!
//! Dependency-injection seams between the offline core and its host
//! application.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync/persistence core and the
//! collaborators the host must supply. Every trait here represents a
//! capability the core needs but does not own: wall-clock time, a
//! connectivity probe, platform link up/down notifications, the remote
//! backend that mutations are replayed against, and the durable flag store
//! that outlives storage-engine switches.
//!
//! ## Traits
//!
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`ProbeTransport`](probe::ProbeTransport) - Latency-measuring reachability probe
//! - [`LinkWatcher`](probe::LinkWatcher) - Platform connectivity change events
//! - [`RemoteBackend`](remote::RemoteBackend) - "Apply one mutation" contract of the remote service
//! - [`FlagStore`](flags::FlagStore) - Durable key/value pairs outside the swappable store
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing; there are no module-level defaults and no global singletons. Each
//! service is constructed with the collaborators it needs and disposed
//! explicitly.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod error;
pub mod flags;
pub mod probe;
pub mod remote;
pub mod time;

pub use error::{BridgeError, Result};
pub use flags::FlagStore;
pub use probe::{LinkEvent, LinkWatcher, ProbeTransport};
pub use remote::{Operation, RemoteBackend, RemoteError};
pub use time::{Clock, SystemClock};
