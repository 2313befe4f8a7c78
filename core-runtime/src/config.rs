//! # Core Configuration Module
//!
//! Builder-constructed configuration holding every dependency and setting the
//! offline core needs. Validation is fail-fast: a missing required
//! collaborator produces an actionable [`Error::CapabilityMissing`] before
//! any service starts.
//!
//! ## Required Dependencies
//!
//! - `RemoteBackend` - where drained mutations are delivered
//! - `FlagStore` - durable markers that survive a storage-engine switch
//! - `ProbeTransport` - the connectivity probe
//!
//! ## Optional Dependencies
//!
//! - `LinkWatcher` - platform connectivity events (polling fallback without)
//! - `Clock` - defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/var/lib/meridian")
//!     .backend(StoreBackend::Relational)
//!     .probe_url("https://static.example.com/ping")
//!     .remote(Arc::new(MyApiClient::new()))
//!     .flag_store(Arc::new(flag_store))
//!     .probe_transport(Arc::new(HttpProbe::new()))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, FlagStore, LinkWatcher, ProbeTransport, RemoteBackend, SystemClock};
use core_store::StoreBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default active-probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default periodic re-probe interval
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);
/// Default periodic drain interval
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(120);
/// Default debounce applied between an enqueue and the drain it triggers
pub const DEFAULT_ENQUEUE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Validated configuration for the offline core
pub struct CoreConfig {
    /// Root directory for all persisted state
    pub data_dir: PathBuf,

    /// Embedded engine backing the local store, read once at startup
    pub backend: StoreBackend,

    /// Probe target: a small, reliably cacheable static resource
    pub probe_url: String,

    /// Upper bound on a single probe
    pub probe_timeout: Duration,

    /// Fixed re-probe cadence while the process is alive
    pub probe_interval: Duration,

    /// Periodic drain cadence, gated on being online
    pub sync_interval: Duration,

    /// Debounce between enqueue bursts and the triggered drain
    pub enqueue_debounce: Duration,

    /// Remote service mutations are replayed against
    pub remote: Arc<dyn RemoteBackend>,

    /// Durable flags that outlive engine switches
    pub flag_store: Arc<dyn FlagStore>,

    /// Active connectivity probe
    pub probe_transport: Arc<dyn ProbeTransport>,

    /// Platform connectivity events; optional
    pub link_watcher: Option<Box<dyn LinkWatcher>>,

    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl CoreConfig {
    /// Start building a configuration
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("backend", &self.backend)
            .field("probe_url", &self.probe_url)
            .field("probe_timeout", &self.probe_timeout)
            .field("probe_interval", &self.probe_interval)
            .field("sync_interval", &self.sync_interval)
            .field("enqueue_debounce", &self.enqueue_debounce)
            .field("remote", &"<dyn RemoteBackend>")
            .field("flag_store", &"<dyn FlagStore>")
            .field("probe_transport", &"<dyn ProbeTransport>")
            .field("link_watcher", &self.link_watcher.is_some())
            .field("clock", &"<dyn Clock>")
            .finish()
    }
}

/// Builder for [`CoreConfig`]
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    backend: Option<StoreBackend>,
    probe_url: Option<String>,
    probe_timeout: Option<Duration>,
    probe_interval: Option<Duration>,
    sync_interval: Option<Duration>,
    enqueue_debounce: Option<Duration>,
    remote: Option<Arc<dyn RemoteBackend>>,
    flag_store: Option<Arc<dyn FlagStore>>,
    probe_transport: Option<Arc<dyn ProbeTransport>>,
    link_watcher: Option<Box<dyn LinkWatcher>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn backend(mut self, backend: StoreBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = Some(url.into());
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = Some(interval);
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn enqueue_debounce(mut self, debounce: Duration) -> Self {
        self.enqueue_debounce = Some(debounce);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn flag_store(mut self, flag_store: Arc<dyn FlagStore>) -> Self {
        self.flag_store = Some(flag_store);
        self
    }

    pub fn probe_transport(mut self, transport: Arc<dyn ProbeTransport>) -> Self {
        self.probe_transport = Some(transport);
        self
    }

    pub fn link_watcher(mut self, watcher: Box<dyn LinkWatcher>) -> Self {
        self.link_watcher = Some(watcher);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and assemble the configuration
    pub fn build(self) -> Result<CoreConfig> {
        let data_dir = self
            .data_dir
            .ok_or_else(|| Error::Config("data_dir is required".to_string()))?;

        let probe_url = self
            .probe_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Config("probe_url is required".to_string()))?;

        let remote = self.remote.ok_or_else(|| Error::CapabilityMissing {
            capability: "RemoteBackend".to_string(),
            message: "No remote backend provided. Inject the host API client.".to_string(),
        })?;

        let flag_store = self.flag_store.ok_or_else(|| Error::CapabilityMissing {
            capability: "FlagStore".to_string(),
            message: "No flag store provided. Desktop hosts: use bridge-desktop's \
                      SqliteFlagStore. Other hosts: inject a platform adapter."
                .to_string(),
        })?;

        let probe_transport = self
            .probe_transport
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "ProbeTransport".to_string(),
                message: "No probe transport provided. Desktop hosts: use bridge-desktop's \
                          HttpProbe. Other hosts: inject a platform adapter."
                    .to_string(),
            })?;

        Ok(CoreConfig {
            data_dir,
            backend: self.backend.unwrap_or(StoreBackend::Relational),
            probe_url,
            probe_timeout: self.probe_timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT),
            probe_interval: self.probe_interval.unwrap_or(DEFAULT_PROBE_INTERVAL),
            sync_interval: self.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL),
            enqueue_debounce: self.enqueue_debounce.unwrap_or(DEFAULT_ENQUEUE_DEBOUNCE),
            remote,
            flag_store,
            probe_transport,
            link_watcher: self.link_watcher,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}
