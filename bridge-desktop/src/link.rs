//! Polling Link Watcher
//!
//! Desktop platforms lack a portable connectivity notification API, so this
//! watcher approximates one: it polls a cheap TCP connect and emits a
//! transition event whenever reachability flips.
//!
//! Note: platform-specific implementations (Linux netlink, macOS
//! SystemConfiguration, Windows Network List Manager) would be more precise
//! but require additional dependencies.

use async_trait::async_trait;
use bridge_traits::probe::{LinkEvent, LinkWatcher};
use std::time::Duration;
use tracing::debug;

const DEFAULT_POLL_TARGET: &str = "8.8.8.8:53";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Link watcher that polls a TCP endpoint for reachability transitions
pub struct TcpLinkWatcher {
    target: String,
    poll_interval: Duration,
    last_up: Option<bool>,
}

impl TcpLinkWatcher {
    /// Create a watcher against the default DNS endpoint
    pub fn new() -> Self {
        Self::with_target(DEFAULT_POLL_TARGET, DEFAULT_POLL_INTERVAL)
    }

    /// Create a watcher against a specific `host:port` target
    pub fn with_target(target: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            target: target.into(),
            poll_interval,
            last_up: None,
        }
    }

    async fn is_reachable(&self) -> bool {
        matches!(
            tokio::time::timeout(
                CONNECT_TIMEOUT,
                tokio::net::TcpStream::connect(&self.target),
            )
            .await,
            Ok(Ok(_))
        )
    }
}

impl Default for TcpLinkWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkWatcher for TcpLinkWatcher {
    async fn next(&mut self) -> Option<LinkEvent> {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let up = self.is_reachable().await;
            if self.last_up != Some(up) {
                self.last_up = Some(up);
                debug!(target = %self.target, up = up, "Link transition observed");
                return Some(if up { LinkEvent::Up } else { LinkEvent::Down });
            }
        }
    }
}
