//! # Network Monitoring Module
//!
//! Watches connectivity and classifies link quality so the sync layer knows
//! when, and how eagerly, to drain.
//!
//! Two detection sources feed one state machine: platform link events
//! (authoritative for going offline, no probe round-trip) and an active
//! latency-measuring probe against a small static resource. See
//! [`NetworkMonitor`] for the full lifecycle.

pub mod monitor;

pub use monitor::{LinkQuality, NetworkMonitor, NetworkState, NetworkStatus, ProbeConfig};
