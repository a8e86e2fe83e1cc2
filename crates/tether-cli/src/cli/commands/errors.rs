//! `tether errors` – show recent classified errors.

use anyhow::Result;

use tether_core::clock::unix_timestamp;
use tether_core::config::TetherConfig;
use tether_core::errors::ErrorCenter;

pub fn run_errors(cfg: &TetherConfig, limit: usize) -> Result<()> {
    let center = ErrorCenter::open_default(&cfg.errors)?;
    let reports = center.recent(limit);
    if reports.is_empty() {
        println!("No errors recorded.");
        return Ok(());
    }

    let now = unix_timestamp();
    println!(
        "{:<10} {:<9} {:<15} {:<16} {}",
        "AGE", "SEVERITY", "CATEGORY", "CONTEXT", "MESSAGE"
    );
    for report in reports {
        let age = format!("{}s", (now - report.timestamp).max(0));
        let resolved = if report.resolved { " (resolved)" } else { "" };
        println!(
            "{:<10} {:<9} {:<15} {:<16} {}{}",
            age,
            report.severity.as_str(),
            report.category.as_str(),
            report.context,
            report.message,
            resolved
        );
    }

    let stats = center.statistics(None);
    if let Some(frequent) = stats.most_frequent_message {
        println!("\nMost frequent: {frequent}");
    }

    Ok(())
}
