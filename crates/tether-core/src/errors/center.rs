//! Bounded error history: recording, presentation policy, statistics, persistence.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::unix_timestamp;
use crate::config::ErrorConfig;

use super::actions::{available_actions, Presentation, RecoveryAction};
use super::classify::classify;
use super::failure::RemoteFailure;
use super::report::{ErrorCategory, ErrorReport, ErrorSeverity};

/// Aggregate view over the history ring (optionally limited to a window).
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total: usize,
    pub by_category: HashMap<ErrorCategory, usize>,
    pub by_severity: HashMap<ErrorSeverity, usize>,
    /// Message with the highest occurrence count (ties: most recent wins).
    pub most_frequent_message: Option<String>,
    pub critical_count: usize,
}

/// Serialized history file. Most-recent-first, capped at the configured
/// capacity on every write.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedErrorHistory {
    #[serde(default = "default_version")]
    version: u8,
    reports: Vec<ErrorReport>,
}

fn default_version() -> u8 {
    1
}

/// Classification entry point plus the persisted diagnostics ring.
///
/// Constructed once by the composition root and shared (`Arc`) between the
/// retry coordinator and the UI layer. Recording never fails: persistence
/// problems are logged and swallowed, the in-memory ring stays authoritative.
pub struct ErrorCenter {
    capacity: usize,
    transient_dismiss: Duration,
    history_path: Option<PathBuf>,
    reports: Mutex<VecDeque<ErrorReport>>,
}

impl ErrorCenter {
    /// Default history file: `~/.local/state/tether/error_history.json`.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tether")?;
        Ok(xdg_dirs
            .get_state_home()
            .join("tether")
            .join("error_history.json"))
    }

    /// Open with the default history location, loading any persisted ring.
    pub fn open_default(cfg: &ErrorConfig) -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path, cfg)
    }

    /// Open with an explicit history file (tests put this in a temp dir).
    pub fn open_at(path: &Path, cfg: &ErrorConfig) -> Result<Self> {
        let reports = load_history(path, cfg.history_capacity)?;
        Ok(Self {
            capacity: cfg.history_capacity.max(1),
            transient_dismiss: Duration::from_secs(cfg.transient_dismiss_secs),
            history_path: Some(path.to_path_buf()),
            reports: Mutex::new(reports),
        })
    }

    /// Purely in-memory center (no persistence). Used by tests and embedders
    /// that manage their own durability.
    pub fn in_memory(cfg: &ErrorConfig) -> Self {
        Self {
            capacity: cfg.history_capacity.max(1),
            transient_dismiss: Duration::from_secs(cfg.transient_dismiss_secs),
            history_path: None,
            reports: Mutex::new(VecDeque::new()),
        }
    }

    /// Classify a failure without recording it.
    pub fn classify(&self, failure: &RemoteFailure, context: &str) -> ErrorReport {
        classify(failure, context)
    }

    /// Classify and record in one step; returns the retained report.
    /// This is the path the retry coordinator takes on every failed attempt.
    pub fn report(&self, failure: &RemoteFailure, context: &str) -> ErrorReport {
        let report = classify(failure, context);
        self.record_and_present(report.clone());
        report
    }

    /// Append to the ring (evicting the oldest past capacity), persist
    /// best-effort, and return the presentation directive: low severity is
    /// transient with a fixed auto-dismiss delay, everything else stays until
    /// acted on. Critical is never auto-dismissed.
    pub fn record_and_present(&self, report: ErrorReport) -> Presentation {
        let presentation = if report.severity == ErrorSeverity::Low {
            Presentation::Transient {
                dismiss_after: self.transient_dismiss,
            }
        } else {
            Presentation::Sticky {
                actions: available_actions(&report),
            }
        };

        let mut reports = self.reports.lock().unwrap();
        reports.push_front(report);
        reports.truncate(self.capacity);
        self.save(&reports);
        presentation
    }

    /// Action set for a report (see [`available_actions`]).
    pub fn available_actions(&self, report: &ErrorReport) -> Vec<RecoveryAction> {
        available_actions(report)
    }

    /// Mark a report resolved. Returns true only on the false -> true
    /// transition; repeated calls and unknown ids return false.
    pub fn mark_resolved(&self, id: Uuid) -> bool {
        let mut reports = self.reports.lock().unwrap();
        let Some(report) = reports.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        if report.resolved {
            return false;
        }
        report.resolved = true;
        self.save(&reports);
        true
    }

    /// Most recent reports, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ErrorReport> {
        let reports = self.reports.lock().unwrap();
        reports.iter().take(limit).cloned().collect()
    }

    /// Aggregate statistics, optionally restricted to the trailing window.
    pub fn statistics(&self, window: Option<Duration>) -> ErrorStats {
        let cutoff = window.map(|w| unix_timestamp().saturating_sub(w.as_secs() as i64));
        let reports = self.reports.lock().unwrap();

        let mut stats = ErrorStats::default();
        let mut message_counts: HashMap<&str, usize> = HashMap::new();
        // Iterate oldest-first so a tie on message count resolves toward the
        // more recent message.
        for report in reports.iter().rev() {
            if let Some(cutoff) = cutoff {
                if report.timestamp < cutoff {
                    continue;
                }
            }
            stats.total += 1;
            *stats.by_category.entry(report.category).or_default() += 1;
            *stats.by_severity.entry(report.severity).or_default() += 1;
            if report.severity == ErrorSeverity::Critical {
                stats.critical_count += 1;
            }
            let count = {
                let count = message_counts.entry(report.message.as_str()).or_default();
                *count += 1;
                *count
            };
            let best = stats
                .most_frequent_message
                .as_deref()
                .map(|m| message_counts.get(m).copied().unwrap_or(0))
                .unwrap_or(0);
            if count >= best {
                stats.most_frequent_message = Some(report.message.clone());
            }
        }
        stats
    }

    /// Drop the entire history (ring and persisted file content).
    pub fn clear(&self) {
        let mut reports = self.reports.lock().unwrap();
        reports.clear();
        self.save(&reports);
    }

    fn save(&self, reports: &VecDeque<ErrorReport>) {
        let Some(path) = &self.history_path else {
            return;
        };
        if let Err(e) = save_history(path, reports) {
            tracing::warn!("error history persist failed: {:#}", e);
        }
    }
}

fn save_history(path: &Path, reports: &VecDeque<ErrorReport>) -> Result<()> {
    let snapshot = PersistedErrorHistory {
        version: 1,
        reports: reports.iter().cloned().collect(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&snapshot).context("serialize error history")?;
    std::fs::write(path, json).with_context(|| format!("write error history: {}", path.display()))?;
    Ok(())
}

/// Load the ring from disk. A missing file starts empty; a corrupt file is
/// logged and discarded (diagnostic data, not worth failing startup over).
fn load_history(path: &Path, capacity: usize) -> Result<VecDeque<ErrorReport>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(VecDeque::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("read error history: {}", path.display()))
        }
    };
    match serde_json::from_slice::<PersistedErrorHistory>(&bytes) {
        Ok(snapshot) => {
            let mut reports: VecDeque<ErrorReport> = snapshot.reports.into();
            reports.truncate(capacity.max(1));
            Ok(reports)
        }
        Err(e) => {
            tracing::warn!("discarding corrupt error history {}: {}", path.display(), e);
            Ok(VecDeque::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg(capacity: usize) -> ErrorConfig {
        ErrorConfig {
            history_capacity: capacity,
            transient_dismiss_secs: 5,
        }
    }

    #[test]
    fn ring_caps_at_capacity_oldest_evicted() {
        let center = ErrorCenter::in_memory(&small_cfg(3));
        for i in 0..5 {
            center.report(&RemoteFailure::Http(500), &format!("op-{i}"));
        }
        let recent = center.recent(10);
        assert_eq!(recent.len(), 3);
        // Newest first; op-0 and op-1 were evicted.
        assert_eq!(recent[0].context, "op-4");
        assert_eq!(recent[2].context, "op-2");
    }

    #[test]
    fn low_severity_presents_transient() {
        let center = ErrorCenter::in_memory(&small_cfg(10));
        let report = center.classify(&RemoteFailure::Cancelled, "op");
        match center.record_and_present(report) {
            Presentation::Transient { dismiss_after } => {
                assert_eq!(dismiss_after, Duration::from_secs(5));
            }
            other => panic!("expected transient, got {:?}", other),
        }
    }

    #[test]
    fn high_severity_presents_sticky_with_actions() {
        let center = ErrorCenter::in_memory(&small_cfg(10));
        let report = center.classify(&RemoteFailure::Offline, "op");
        match center.record_and_present(report) {
            Presentation::Sticky { actions } => {
                assert!(actions.contains(&RecoveryAction::Retry));
                assert!(actions.contains(&RecoveryAction::Dismiss));
            }
            other => panic!("expected sticky, got {:?}", other),
        }
    }

    #[test]
    fn mark_resolved_transitions_exactly_once() {
        let center = ErrorCenter::in_memory(&small_cfg(10));
        let report = center.report(&RemoteFailure::Timeout, "op");
        assert!(center.mark_resolved(report.id));
        assert!(!center.mark_resolved(report.id));
        assert!(!center.mark_resolved(Uuid::new_v4()));
        assert!(center.recent(1)[0].resolved);
    }

    #[test]
    fn statistics_count_categories_and_criticals() {
        let center = ErrorCenter::in_memory(&small_cfg(20));
        center.report(&RemoteFailure::Offline, "a");
        center.report(&RemoteFailure::Timeout, "b");
        center.report(&RemoteFailure::Storage("disk full".into()), "c");
        center.report(&RemoteFailure::Timeout, "d");

        let stats = center.statistics(None);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_category.get(&ErrorCategory::Network), Some(&3));
        assert_eq!(stats.by_category.get(&ErrorCategory::Storage), Some(&1));
        assert_eq!(stats.critical_count, 1);
        assert_eq!(
            stats.most_frequent_message.as_deref(),
            Some("The request timed out")
        );
    }

    #[test]
    fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error_history.json");
        let cfg = small_cfg(10);

        {
            let center = ErrorCenter::open_at(&path, &cfg).unwrap();
            center.report(&RemoteFailure::Http(503), "sync:list");
            center.report(&RemoteFailure::Offline, "sync:push");
        }

        let center = ErrorCenter::open_at(&path, &cfg).unwrap();
        let recent = center.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].context, "sync:push");
        assert_eq!(recent[1].context, "sync:list");
    }

    #[test]
    fn corrupt_history_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error_history.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let center = ErrorCenter::open_at(&path, &small_cfg(10)).unwrap();
        assert!(center.recent(10).is_empty());
    }

    #[test]
    fn clear_empties_ring_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error_history.json");
        let cfg = small_cfg(10);

        let center = ErrorCenter::open_at(&path, &cfg).unwrap();
        center.report(&RemoteFailure::Timeout, "op");
        center.clear();
        assert!(center.recent(10).is_empty());

        let reopened = ErrorCenter::open_at(&path, &cfg).unwrap();
        assert!(reopened.recent(10).is_empty());
    }
}
