//! Logging init.
//!
//! The CLI appends to a log file under the XDG state dir so diagnostics
//! survive the process. An embedding app normally installs its own
//! subscriber first; both init functions use `try_init` and simply report
//! when the global slot is already taken.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tether=debug"))
}

/// Default log file: `~/.local/state/tether/tether.log`.
pub fn default_log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tether")?;
    Ok(xdg_dirs.get_state_home().join("tether").join("tether.log"))
}

/// Initialize logging to the default log file, appending across runs.
/// Errors if the state dir is unwritable or a subscriber is already set;
/// callers fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let path = default_log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir: {}", parent.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file: {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("set global subscriber: {e}"))?;

    tracing::info!("logging to {}", path.display());
    Ok(())
}

/// Stderr-only logging for when the log file is unavailable. A subscriber
/// installed earlier wins; this never panics.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
