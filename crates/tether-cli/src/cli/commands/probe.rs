//! `tether probe [base-url]` – run a speed test and print the measurement.

use anyhow::Result;
use std::sync::Arc;

use tether_core::config::TetherConfig;
use tether_core::connectivity::ConnectivityMonitor;
use tether_core::transport::CurlTransport;

pub async fn run_probe(cfg: &TetherConfig, base_url: Option<&str>) -> Result<()> {
    let mut conn_cfg = cfg.connectivity.clone();
    if let Some(url) = base_url {
        conn_cfg.probe_base_url = url.to_string();
    }

    // One-shot measurement; nothing worth persisting into the history.
    let monitor = ConnectivityMonitor::in_memory(&conn_cfg, Arc::new(CurlTransport::new()));
    println!("Probing {} ...", conn_cfg.probe_base_url);
    let report = monitor.speed_test().await;

    if let Some(err) = &report.error {
        println!("Speed test incomplete: {err}");
    }
    println!(
        "  download: {:>8.2} Mbps\n  upload:   {:>8.2} Mbps\n  latency:  {:>8} ms",
        report.download_mbps(),
        report.upload_mbps(),
        report.latency.as_millis()
    );
    println!("  quality:  {}", monitor.quality(&report).as_str());

    Ok(())
}
