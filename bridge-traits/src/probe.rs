//! Connectivity Probe Abstraction
//!
//! Provides the two detection sources the network monitor combines: an
//! active, latency-measuring reachability probe and a stream of platform
//! link up/down events.

use std::time::Duration;

use crate::error::Result;

/// Active reachability probe
///
/// A single bounded request against a small, reliably cacheable static
/// resource reachable over the same transport as the remote service. The
/// measured round-trip time feeds the link-quality classification.
///
/// # Platform Support
///
/// - **Desktop**: HTTP HEAD via `bridge-desktop`
/// - **Mobile/embedded hosts**: whatever reachability primitive the host has
///
/// # Example
///
/// ```ignore
/// use bridge_traits::probe::ProbeTransport;
/// use std::time::Duration;
///
/// async fn latency(probe: &dyn ProbeTransport, url: &str) -> Option<Duration> {
///     probe.probe(url, Duration::from_secs(5)).await.ok()
/// }
/// ```
#[async_trait::async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Probe the target once and return the observed round-trip time.
    ///
    /// Must complete within `timeout`; a timeout or transport failure is an
    /// error and is interpreted as "offline" by the caller.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<Duration>;
}

/// A platform connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The platform reports a usable link came up
    Up,
    /// The platform reports the link went away
    Down,
}

/// Stream of platform connectivity change events
///
/// `Down` events are authoritative: the monitor goes offline immediately
/// without waiting for a probe. `Up` events only schedule a probe; the probe
/// outcome decides the resulting state.
#[async_trait::async_trait]
pub trait LinkWatcher: Send {
    /// Get the next link transition.
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<LinkEvent>;
}
