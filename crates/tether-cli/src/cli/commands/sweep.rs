//! `tether sweep` – purge expired cache entries now.

use anyhow::Result;

use tether_core::config::TetherConfig;
use tether_core::store::TieredCache;

pub async fn run_sweep(cfg: &TetherConfig) -> Result<()> {
    let cache = TieredCache::open_default(&cfg.cache).await?;
    let purged = cache.sweep_expired().await;
    if purged == 0 {
        println!("No expired entries.");
    } else {
        println!("Purged {purged} expired entries.");
    }
    Ok(())
}
