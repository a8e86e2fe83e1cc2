use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::status::LinkType;

/// One recorded status transition. Append-only; the ring never rewrites
/// history, it only forgets the oldest entries past capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectivityEvent {
    pub timestamp: i64,
    pub connected: bool,
    pub link: LinkType,
}

/// Aggregates derived from the event ring.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryStats {
    /// Fraction of the observed span spent connected (0.0 with no history).
    pub uptime_ratio: f64,
    pub disconnect_count: usize,
    pub event_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEventLog {
    #[serde(default = "default_version")]
    version: u8,
    events: Vec<ConnectivityEvent>,
}

fn default_version() -> u8 {
    1
}

/// Bounded, persisted transition history, newest first.
pub struct EventLog {
    capacity: usize,
    path: Option<PathBuf>,
    events: VecDeque<ConnectivityEvent>,
}

impl EventLog {
    /// Purely in-memory log, no persistence.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            path: None,
            events: VecDeque::new(),
        }
    }

    /// Open a persisted log. A missing file starts empty; a corrupt one is
    /// logged and discarded.
    pub fn load(path: PathBuf, capacity: usize) -> Result<Self> {
        let events = load_events(&path, capacity)?;
        Ok(Self {
            capacity: capacity.max(1),
            path: Some(path),
            events,
        })
    }

    pub fn record(&mut self, event: ConnectivityEvent) {
        self.events.push_front(event);
        self.events.truncate(self.capacity);
        self.save();
    }

    pub fn recent(&self, limit: usize) -> Vec<ConnectivityEvent> {
        self.events.iter().take(limit).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Disconnection events at or after `cutoff` (stability input).
    pub fn disconnects_since(&self, cutoff: i64) -> usize {
        self.events
            .iter()
            .take_while(|e| e.timestamp >= cutoff)
            .filter(|e| !e.connected)
            .count()
    }

    /// Walk the transitions oldest to newest and attribute wall time to the
    /// state each one established; the newest state runs until `now`.
    pub fn stats(&self, now: i64) -> HistoryStats {
        let event_count = self.events.len();
        let disconnect_count = self.events.iter().filter(|e| !e.connected).count();

        let mut uptime_ratio = 0.0;
        if let (Some(oldest), Some(latest)) = (self.events.back(), self.events.front()) {
            let span = now - oldest.timestamp;
            if span > 0 {
                let mut connected_secs = 0i64;
                let mut iter = self.events.iter().rev().peekable();
                while let Some(event) = iter.next() {
                    let until = iter.peek().map(|next| next.timestamp).unwrap_or(now);
                    if event.connected {
                        connected_secs += (until - event.timestamp).max(0);
                    }
                }
                uptime_ratio = connected_secs as f64 / span as f64;
            } else {
                uptime_ratio = if latest.connected { 1.0 } else { 0.0 };
            }
        }

        HistoryStats {
            uptime_ratio,
            disconnect_count,
            event_count,
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.save();
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = save_events(path, &self.events) {
            tracing::warn!("connectivity history persist failed: {:#}", e);
        }
    }
}

fn save_events(path: &Path, events: &VecDeque<ConnectivityEvent>) -> Result<()> {
    let snapshot = PersistedEventLog {
        version: 1,
        events: events.iter().copied().collect(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&snapshot).context("serialize connectivity history")?;
    std::fs::write(path, json)
        .with_context(|| format!("write connectivity history: {}", path.display()))?;
    Ok(())
}

fn load_events(path: &Path, capacity: usize) -> Result<VecDeque<ConnectivityEvent>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(VecDeque::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("read connectivity history: {}", path.display()))
        }
    };
    match serde_json::from_slice::<PersistedEventLog>(&bytes) {
        Ok(snapshot) => {
            let mut events: VecDeque<ConnectivityEvent> = snapshot.events.into();
            events.truncate(capacity.max(1));
            Ok(events)
        }
        Err(e) => {
            tracing::warn!(
                "discarding corrupt connectivity history {}: {}",
                path.display(),
                e
            );
            Ok(VecDeque::new())
        }
    }
}
