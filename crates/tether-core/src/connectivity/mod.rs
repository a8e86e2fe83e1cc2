//! Connectivity monitoring.
//!
//! Tracks a tri-state connection status fed by the embedding platform's path
//! observer (or the built-in fallback poller), records every transition in a
//! bounded persisted history, and runs capped speed probes to grade link
//! quality. Status changes are published through a `watch` channel; the
//! retry coordinator subscribes to it and drains on reconnect.
//!
//! Probes observe the link, they never define it: a failed speed test lands
//! in the report's `error` field and leaves the status untouched.

mod advice;
mod events;
mod speed;
mod status;

pub use events::{ConnectivityEvent, HistoryStats};
pub use speed::{quality_tier, QualityTier, SpeedTestReport};
pub use status::{ConnectionStatus, LinkType, PathSample};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::clock::unix_timestamp;
use crate::config::ConnectivityConfig;
use crate::transport::ProbeTransport;

use events::EventLog;

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

struct MonitorInner {
    events: EventLog,
    last_auto_probe: Option<Instant>,
    last_report: Option<SpeedTestReport>,
}

/// Single source of truth for connection state.
///
/// Constructed once and shared (`Arc`). The mutex guards the event ring and
/// probe bookkeeping; status itself lives in the watch channel so readers
/// never contend with history writes.
pub struct ConnectivityMonitor {
    cfg: ConnectivityConfig,
    transport: Arc<dyn ProbeTransport>,
    status_tx: watch::Sender<ConnectionStatus>,
    inner: Mutex<MonitorInner>,
}

impl ConnectivityMonitor {
    /// Default history file: `~/.local/state/tether/connectivity_history.json`.
    pub fn default_history_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tether")?;
        Ok(xdg_dirs
            .get_state_home()
            .join("tether")
            .join("connectivity_history.json"))
    }

    pub fn open_default(
        cfg: &ConnectivityConfig,
        transport: Arc<dyn ProbeTransport>,
    ) -> Result<Self> {
        let path = Self::default_history_path()?;
        Self::open_at(&path, cfg, transport)
    }

    /// Open with an explicit history file.
    pub fn open_at(
        path: &Path,
        cfg: &ConnectivityConfig,
        transport: Arc<dyn ProbeTransport>,
    ) -> Result<Self> {
        let events = EventLog::load(path.to_path_buf(), cfg.history_capacity)?;
        Ok(Self::with_events(cfg, transport, events))
    }

    /// Monitor without history persistence.
    pub fn in_memory(cfg: &ConnectivityConfig, transport: Arc<dyn ProbeTransport>) -> Self {
        Self::with_events(cfg, transport, EventLog::new(cfg.history_capacity))
    }

    fn with_events(
        cfg: &ConnectivityConfig,
        transport: Arc<dyn ProbeTransport>,
        events: EventLog,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Unknown);
        Self {
            cfg: cfg.clone(),
            transport,
            status_tx,
            inner: Mutex::new(MonitorInner {
                events,
                last_auto_probe: None,
                last_report: None,
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// Receiver for status transitions. The retry coordinator holds one of
    /// these to detect reconnects.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Feed one path observation. A change of status (including a change of
    /// link while staying connected) records an event and notifies watchers;
    /// a repeated observation is a no-op. Returns whether status changed.
    pub fn report_path(&self, sample: PathSample) -> bool {
        let new_status = sample.status();
        let mut inner = self.inner.lock().unwrap();
        let prev = *self.status_tx.borrow();
        if prev == new_status {
            return false;
        }
        inner.events.record(ConnectivityEvent {
            timestamp: unix_timestamp(),
            connected: new_status.is_connected(),
            link: match new_status {
                ConnectionStatus::Connected(link) => link,
                _ => LinkType::None,
            },
        });
        tracing::info!("connectivity changed: {prev} -> {new_status}");
        self.status_tx.send_replace(new_status);
        true
    }

    /// Run a full speed test now. While disconnected the network is not
    /// touched and an all-zero report explains itself through `error`; that
    /// skip is not retained as the last measurement.
    pub async fn speed_test(&self) -> SpeedTestReport {
        if self.status() == ConnectionStatus::Disconnected {
            return SpeedTestReport::unavailable("offline: speed test skipped");
        }
        let report = speed::run_probes(self.transport.as_ref(), &self.cfg.probe_base_url).await;
        match &report.error {
            Some(err) => tracing::warn!("speed test failed: {err}"),
            None => tracing::debug!(
                "speed test: {:.1} mbps down, {:.1} mbps up, {:?} latency",
                report.download_mbps(),
                report.upload_mbps(),
                report.latency
            ),
        }
        self.inner.lock().unwrap().last_report = Some(report.clone());
        report
    }

    /// Speed test on reconnect, rate-limited to one per configured interval.
    /// Returns `None` when skipped (offline or too soon).
    pub async fn maybe_auto_speed_test(&self) -> Option<SpeedTestReport> {
        if !self.status().is_connected() {
            return None;
        }
        {
            let mut inner = self.inner.lock().unwrap();
            let now = Instant::now();
            if let Some(last) = inner.last_auto_probe {
                if now.duration_since(last) < self.cfg.speed_test_interval() {
                    return None;
                }
            }
            // Marked before running so concurrent triggers collapse to one.
            inner.last_auto_probe = Some(now);
        }
        Some(self.speed_test().await)
    }

    pub fn quality(&self, report: &SpeedTestReport) -> QualityTier {
        speed::quality_tier(&self.cfg, report)
    }

    pub fn last_speed_report(&self) -> Option<SpeedTestReport> {
        self.inner.lock().unwrap().last_report.clone()
    }

    /// Fewer disconnects inside the trailing stability window than the
    /// configured threshold.
    pub fn is_stable(&self) -> bool {
        let cutoff = unix_timestamp() - self.cfg.stability_window_secs as i64;
        let inner = self.inner.lock().unwrap();
        inner.events.disconnects_since(cutoff) < self.cfg.stability_disconnect_threshold
    }

    pub fn recent_events(&self, limit: usize) -> Vec<ConnectivityEvent> {
        self.inner.lock().unwrap().events.recent(limit)
    }

    pub fn history_stats(&self) -> HistoryStats {
        self.inner.lock().unwrap().events.stats(unix_timestamp())
    }

    pub fn clear_history(&self) {
        self.inner.lock().unwrap().events.clear();
    }

    /// Advisories for the current situation, derived from status, the last
    /// measured quality, and stability.
    pub fn recommendations(&self) -> Vec<String> {
        let quality = self.last_speed_report().map(|r| self.quality(&r));
        advice::recommendations(self.status(), quality, self.is_stable())
    }

    /// One reachability probe mapped into a path sample. Any response, even
    /// an error status, proves the network is reachable; the probe cannot
    /// see the physical link, so it reports `LinkType::Other`.
    pub async fn poll_once(&self) {
        let base = self.cfg.probe_base_url.trim_end_matches('/');
        let url = format!("{base}/__down?bytes=0");
        let sample = match self.transport.get(&url, 1024, REACHABILITY_TIMEOUT).await {
            Ok(_) => PathSample {
                reachable: true,
                link: LinkType::Other,
            },
            Err(e) => {
                tracing::debug!("reachability probe failed: {e}");
                PathSample {
                    reachable: false,
                    link: LinkType::None,
                }
            }
        };
        self.report_path(sample);
    }

    /// Fallback poll loop for hosts without a platform path observer (the
    /// CLI, headless daemons). Runs until the task is dropped.
    pub async fn run_poll_loop(self: Arc<Self>) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.cfg.poll_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
            self.maybe_auto_speed_test().await;
        }
    }
}
