//! Connectivity state machine with active probing.
//!
//! States: `Unknown -> {Online, Offline}` with a quality classification
//! attached. Platform `Down` events flip the state to Offline immediately;
//! everything else goes through the probe. Quality policy: probe round-trip
//! under the threshold is `Good`, at or over it is `Poor`, probe failure is
//! `Offline`.

use bridge_traits::probe::{LinkEvent, LinkWatcher, ProbeTransport};
use core_runtime::events::{CoreEvent, EventBus, NetworkEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Raw connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Unknown,
    Online,
    Offline,
}

impl NetworkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Latency-derived link classification, distinct from raw connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkQuality {
    Good,
    Poor,
    Offline,
}

impl LinkQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Poor => "poor",
            Self::Offline => "offline",
        }
    }
}

/// Snapshot of the current link; recomputed on every probe, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub status: NetworkStatus,
    pub quality: LinkQuality,
    pub last_latency_ms: Option<u32>,
}

impl NetworkState {
    fn unknown() -> Self {
        Self {
            status: NetworkStatus::Unknown,
            quality: LinkQuality::Offline,
            last_latency_ms: None,
        }
    }

    fn offline() -> Self {
        Self {
            status: NetworkStatus::Offline,
            quality: LinkQuality::Offline,
            last_latency_ms: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == NetworkStatus::Online
    }
}

/// Probe scheduling and classification settings
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Probe target URL
    pub url: String,
    /// Upper bound on one probe
    pub timeout: Duration,
    /// Fixed re-probe cadence
    pub interval: Duration,
    /// Round-trip at or above this is classified Poor
    pub poor_threshold: Duration,
}

impl ProbeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(30),
            poor_threshold: Duration::from_millis(500),
        }
    }
}

struct Inner {
    transport: Arc<dyn ProbeTransport>,
    config: ProbeConfig,
    state_tx: watch::Sender<NetworkState>,
    event_bus: Option<EventBus>,
    token: CancellationToken,
}

impl Inner {
    /// Probe once and fold the outcome into the state machine.
    async fn probe_and_apply(&self) -> NetworkState {
        let observed = match self.transport.probe(&self.config.url, self.config.timeout).await {
            Ok(latency) => {
                let latency_ms = latency.as_millis().min(u32::MAX as u128) as u32;
                let quality = if latency < self.config.poor_threshold {
                    LinkQuality::Good
                } else {
                    LinkQuality::Poor
                };
                NetworkState {
                    status: NetworkStatus::Online,
                    quality,
                    last_latency_ms: Some(latency_ms),
                }
            }
            Err(e) => {
                debug!(error = %e, "Probe failed");
                NetworkState::offline()
            }
        };

        self.apply(observed);
        observed
    }

    /// Publish a state transition. Results arriving after dispose are
    /// discarded so nothing mutates a dead monitor.
    fn apply(&self, state: NetworkState) {
        if self.token.is_cancelled() {
            return;
        }

        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            info!(
                status = state.status.as_str(),
                quality = state.quality.as_str(),
                latency_ms = ?state.last_latency_ms,
                "Network state changed"
            );
            if let Some(bus) = &self.event_bus {
                bus.emit(CoreEvent::Network(NetworkEvent::StatusChanged {
                    status: state.status.as_str().to_string(),
                    quality: state.quality.as_str().to_string(),
                    latency_ms: state.last_latency_ms,
                }))
                .ok();
            }
        }
    }
}

/// Connectivity monitor with explicit lifecycle.
///
/// Construction spawns the probe scheduler (immediate probe, then the fixed
/// interval) and, when a watcher is supplied, the platform event loop.
/// [`dispose`](NetworkMonitor::dispose) cancels both; in-flight probe results
/// are discarded after that.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
}

impl NetworkMonitor {
    /// Start monitoring.
    ///
    /// `link_watcher` is optional; without one, offline detection relies on
    /// probe failures alone.
    pub fn start(
        transport: Arc<dyn ProbeTransport>,
        link_watcher: Option<Box<dyn LinkWatcher>>,
        config: ProbeConfig,
        event_bus: Option<EventBus>,
    ) -> Self {
        let (state_tx, _) = watch::channel(NetworkState::unknown());
        let inner = Arc::new(Inner {
            transport,
            config,
            state_tx,
            event_bus,
            token: CancellationToken::new(),
        });

        Self::spawn_probe_loop(Arc::clone(&inner));
        if let Some(watcher) = link_watcher {
            Self::spawn_link_loop(Arc::clone(&inner), watcher);
        }

        Self { inner }
    }

    fn spawn_probe_loop(inner: Arc<Inner>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.config.interval);
            // First tick fires immediately: the initial probe
            loop {
                tokio::select! {
                    _ = inner.token.cancelled() => break,
                    _ = interval.tick() => {
                        inner.probe_and_apply().await;
                    }
                }
            }
        });
    }

    fn spawn_link_loop(inner: Arc<Inner>, mut watcher: Box<dyn LinkWatcher>) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.token.cancelled() => break,
                    event = watcher.next() => {
                        match event {
                            // Down is authoritative: no probe round-trip
                            Some(LinkEvent::Down) => {
                                warn!("Platform reported link down");
                                inner.apply(NetworkState::offline());
                            }
                            // Up only schedules a probe; the probe decides
                            Some(LinkEvent::Up) => {
                                inner.probe_and_apply().await;
                            }
                            None => break,
                        }
                    }
                }
            }
        });
    }

    /// Receiver that yields the current state immediately and every change
    /// after; no polling needed.
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.inner.state_tx.subscribe()
    }

    /// Current snapshot
    pub fn current(&self) -> NetworkState {
        *self.inner.state_tx.borrow()
    }

    /// Whether the last observation was Online
    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Force an immediate probe and return the resulting state.
    ///
    /// After dispose this returns the last state without probing.
    pub async fn check_now(&self) -> NetworkState {
        if self.inner.token.is_cancelled() {
            return self.current();
        }
        self.inner.probe_and_apply().await
    }

    /// Resolve `true` the moment Online is observed, `false` when the
    /// timeout elapses first.
    pub async fn wait_for_online(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        if rx.borrow().is_online() {
            return true;
        }

        tokio::time::timeout(timeout, async {
            loop {
                if rx.changed().await.is_err() {
                    return false;
                }
                if rx.borrow().is_online() {
                    return true;
                }
            }
        })
        .await
        .unwrap_or(false)
    }

    /// Cancel the probe scheduler and the link-event loop
    pub fn dispose(&self) {
        self.inner.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Probe fake that replays a script, repeating the last entry
    struct ScriptedProbe {
        script: Mutex<VecDeque<Result<Duration, ()>>>,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Result<Duration, ()>>) -> Arc<Self> {
            assert!(!script.is_empty());
            Arc::new(Self {
                script: Mutex::new(VecDeque::from(script)),
            })
        }
    }

    #[async_trait::async_trait]
    impl ProbeTransport for ScriptedProbe {
        async fn probe(
            &self,
            _url: &str,
            _timeout: Duration,
        ) -> bridge_traits::Result<Duration> {
            let mut script = self.script.lock().await;
            let entry = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                *script.front().unwrap()
            };
            entry.map_err(|_| BridgeError::OperationFailed("probe failed".to_string()))
        }
    }

    fn config() -> ProbeConfig {
        ProbeConfig::new("https://static.example.com/ping")
    }

    fn start_with(script: Vec<Result<Duration, ()>>) -> NetworkMonitor {
        NetworkMonitor::start(ScriptedProbe::new(script), None, config(), None)
    }

    #[tokio::test]
    async fn test_fast_probe_is_good_quality() {
        let monitor = start_with(vec![Ok(Duration::from_millis(100))]);
        let state = monitor.check_now().await;

        assert_eq!(state.status, NetworkStatus::Online);
        assert_eq!(state.quality, LinkQuality::Good);
        assert_eq!(state.last_latency_ms, Some(100));
        monitor.dispose();
    }

    #[tokio::test]
    async fn test_slow_probe_is_poor_quality() {
        let monitor = start_with(vec![Ok(Duration::from_millis(800))]);
        let state = monitor.check_now().await;

        assert_eq!(state.status, NetworkStatus::Online);
        assert_eq!(state.quality, LinkQuality::Poor);
        assert_eq!(state.last_latency_ms, Some(800));
        monitor.dispose();
    }

    #[tokio::test]
    async fn test_failed_probe_is_offline() {
        let monitor = start_with(vec![Err(())]);
        let state = monitor.check_now().await;

        assert_eq!(state.status, NetworkStatus::Offline);
        assert_eq!(state.quality, LinkQuality::Offline);
        assert_eq!(state.last_latency_ms, None);
        monitor.dispose();
    }

    #[tokio::test]
    async fn test_subscribe_sees_current_state_immediately() {
        let monitor = start_with(vec![Ok(Duration::from_millis(50))]);

        // Before any probe lands the state is Unknown
        let rx = monitor.subscribe();
        assert_eq!(rx.borrow().status, NetworkStatus::Unknown);

        monitor.check_now().await;
        let rx2 = monitor.subscribe();
        assert!(rx2.borrow().is_online());
        monitor.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_reprobe_recovers() {
        // First probe fails, the scheduled re-probe succeeds
        let monitor = start_with(vec![Err(()), Ok(Duration::from_millis(30))]);

        assert!(monitor.wait_for_online(Duration::from_secs(120)).await);
        monitor.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_online_times_out_while_offline() {
        let monitor = start_with(vec![Err(())]);
        assert!(!monitor.wait_for_online(Duration::from_secs(3)).await);
        monitor.dispose();
    }

    #[tokio::test]
    async fn test_link_down_bypasses_probe() {
        struct OneShotDown {
            sent: bool,
        }

        #[async_trait::async_trait]
        impl LinkWatcher for OneShotDown {
            async fn next(&mut self) -> Option<LinkEvent> {
                if self.sent {
                    // Keep the stream open without producing more events
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                // Let the initial probe land first so the Down event is the
                // one that wins
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.sent = true;
                Some(LinkEvent::Down)
            }
        }

        // Probe always reports a healthy link; the platform event wins anyway
        let monitor = NetworkMonitor::start(
            ScriptedProbe::new(vec![Ok(Duration::from_millis(10))]),
            Some(Box::new(OneShotDown { sent: false })),
            config(),
            None,
        );

        let mut rx = monitor.subscribe();
        // Wait until the Down event lands
        while rx.borrow().status != NetworkStatus::Offline {
            if rx.changed().await.is_err() {
                break;
            }
        }
        assert_eq!(monitor.current().quality, LinkQuality::Offline);
        monitor.dispose();
    }

    #[tokio::test]
    async fn test_disposed_monitor_discards_probe_results() {
        let monitor = start_with(vec![Ok(Duration::from_millis(10))]);
        monitor.check_now().await;
        assert!(monitor.is_online());

        monitor.dispose();
        let before = monitor.current();
        let after = monitor.check_now().await;
        assert_eq!(before, after);
    }
}
