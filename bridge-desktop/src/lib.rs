//! # Desktop Bridge Implementations
//!
//! Native implementations of the bridge traits for desktop hosts:
//!
//! - [`HttpProbe`] - reqwest-based reachability probe with latency measurement
//! - [`TcpLinkWatcher`] - polling link watcher built on a cheap TCP connect
//! - [`SqliteFlagStore`] - durable flags in a dedicated SQLite file that
//!   survives storage-engine switches
//!
//! Mobile and web hosts supply their own adapters for the same traits; the
//! core never depends on this crate directly.

pub mod flag_store;
pub mod link;
pub mod probe;

pub use flag_store::SqliteFlagStore;
pub use link::TcpLinkWatcher;
pub use probe::HttpProbe;
