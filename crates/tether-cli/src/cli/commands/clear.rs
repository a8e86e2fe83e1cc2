//! `tether clear` – clear the cache and, on request, the persisted histories.

use anyhow::Result;
use std::sync::Arc;

use tether_core::config::TetherConfig;
use tether_core::connectivity::ConnectivityMonitor;
use tether_core::errors::ErrorCenter;
use tether_core::store::TieredCache;
use tether_core::transport::CurlTransport;

pub async fn run_clear(cfg: &TetherConfig, errors: bool, events: bool) -> Result<()> {
    let cache = TieredCache::open_default(&cfg.cache).await?;
    cache.clear().await;
    println!("Cache cleared.");

    if errors {
        let center = ErrorCenter::open_default(&cfg.errors)?;
        center.clear();
        println!("Error history cleared.");
    }

    if events {
        let monitor =
            ConnectivityMonitor::open_default(&cfg.connectivity, Arc::new(CurlTransport::new()))?;
        monitor.clear_history();
        println!("Connectivity history cleared.");
    }

    Ok(())
}
