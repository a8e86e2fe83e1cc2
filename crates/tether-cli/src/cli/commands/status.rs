//! `tether status` – one-shot snapshot of connectivity, cache, and queue.

use anyhow::Result;
use std::sync::Arc;

use tether_core::config::TetherConfig;
use tether_core::connectivity::ConnectivityMonitor;
use tether_core::errors::ErrorCenter;
use tether_core::retry::QueueDb;
use tether_core::store::TieredCache;
use tether_core::transport::CurlTransport;

pub async fn run_status(cfg: &TetherConfig) -> Result<()> {
    let monitor =
        ConnectivityMonitor::open_default(&cfg.connectivity, Arc::new(CurlTransport::new()))?;
    monitor.poll_once().await;

    let stable = if monitor.is_stable() { "stable" } else { "unstable" };
    println!("Connectivity: {} ({stable})", monitor.status());
    let history = monitor.history_stats();
    if history.event_count > 0 {
        println!(
            "  history: {:.0}% uptime, {} disconnects over {} events",
            history.uptime_ratio * 100.0,
            history.disconnect_count,
            history.event_count
        );
    }
    for hint in monitor.recommendations() {
        println!("  hint: {hint}");
    }

    let cache = TieredCache::open_default(&cfg.cache).await?;
    let stats = cache.statistics().await;
    println!(
        "Cache: {} entries, {} bytes in memory, {} bytes on disk, hit rate {:.0}%",
        stats.entry_count,
        stats.memory_bytes,
        stats.disk_bytes,
        stats.hit_rate * 100.0
    );

    let queue = QueueDb::open_default().await?;
    println!("Retry queue: {} operations", queue.count().await?);

    let errors = ErrorCenter::open_default(&cfg.errors)?;
    let error_stats = errors.statistics(None);
    if error_stats.total > 0 {
        println!(
            "Errors: {} recorded, {} critical",
            error_stats.total, error_stats.critical_count
        );
    }

    Ok(())
}
