use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Cache tier budgets and sweep cadence (`[cache]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Byte budget for the in-memory tier before eviction kicks in.
    pub max_memory_bytes: u64,
    /// Entry-count budget for the in-memory tier.
    pub max_entries: usize,
    /// Interval between background expiration sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 50 * 1024 * 1024,
            max_entries: 1000,
            sweep_interval_secs: 3600,
        }
    }
}

/// Retry/backoff parameters (`[retry]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Default retry budget per operation (attempts = 1 initial + max_retries).
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff (e.g. 1.0 = 1s).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

/// Connectivity monitoring and speed-probe policy (`[connectivity]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Base URL for reachability and speed probes.
    pub probe_base_url: String,
    /// Minimum spacing between automatic speed tests, in seconds.
    pub speed_test_interval_secs: u64,
    /// Poll interval for the fallback reachability poller, in seconds.
    pub poll_interval_secs: u64,
    /// Trailing window for stability analysis, in seconds.
    pub stability_window_secs: u64,
    /// Disconnection count within the window at which the link counts as unstable.
    pub stability_disconnect_threshold: usize,
    /// Bounded capacity of the connectivity event history.
    pub history_capacity: usize,
    /// Download Mbps at or above which quality is Excellent.
    pub excellent_mbps: f64,
    /// Download Mbps at or above which quality is Good.
    pub good_mbps: f64,
    /// Download Mbps at or above which quality is Fair (below is Poor).
    pub fair_mbps: f64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_base_url: "https://speed.cloudflare.com".to_string(),
            speed_test_interval_secs: 300,
            poll_interval_secs: 30,
            stability_window_secs: 300,
            stability_disconnect_threshold: 3,
            history_capacity: 100,
            excellent_mbps: 25.0,
            good_mbps: 10.0,
            fair_mbps: 3.0,
        }
    }
}

impl ConnectivityConfig {
    pub fn speed_test_interval(&self) -> Duration {
        Duration::from_secs(self.speed_test_interval_secs)
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_secs(self.stability_window_secs)
    }
}

/// Error history and presentation policy (`[errors]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorConfig {
    /// Bounded capacity of the persisted error history ring.
    pub history_capacity: usize,
    /// Auto-dismiss delay for low-severity reports, in seconds.
    pub transient_dismiss_secs: u64,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            transient_dismiss_secs: 5,
        }
    }
}

/// Global configuration loaded from `~/.config/tether/config.toml`.
///
/// Every section is optional in the file; missing sections take the built-in
/// defaults so a partial config stays valid across upgrades.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub errors: ErrorConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tether")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TetherConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TetherConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TetherConfig = toml::from_str(&data)?;
    Ok(cfg)
}
