//! Reachability Probe using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    probe::ProbeTransport,
};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

/// Reqwest-based reachability probe
///
/// Issues a HEAD request against the configured target and reports the
/// observed round-trip time. The target should be a small, reliably
/// cacheable static resource served over the same transport as the remote
/// backend.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Create a new probe with default connection settings
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(1)
            .user_agent("meridian-offline-core/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    /// Create a probe over an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeTransport for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<Duration> {
        let started = Instant::now();

        let response = tokio::time::timeout(timeout, self.client.head(url).send())
            .await
            .map_err(|_| BridgeError::ProbeTimeout(timeout.as_millis() as u64))?
            .map_err(|e| BridgeError::OperationFailed(format!("Probe request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "Probe target returned status {}",
                response.status()
            )));
        }

        let latency = started.elapsed();
        debug!(url = url, latency_ms = latency.as_millis() as u64, "Probe succeeded");
        Ok(latency)
    }
}
