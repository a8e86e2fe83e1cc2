//! `tether queue` – list persisted retry-queue rows.

use anyhow::Result;

use tether_core::clock::unix_timestamp;
use tether_core::retry::QueueDb;

pub async fn run_queue() -> Result<()> {
    let db = QueueDb::open_default().await?;
    let rows = db.list_all().await?;
    if rows.is_empty() {
        println!("Retry queue is empty.");
        return Ok(());
    }

    let now = unix_timestamp();
    println!(
        "{:<38} {:<10} {:<8} {:<10} {}",
        "ID", "STATE", "RETRIES", "DUE", "CONTEXT"
    );
    for row in rows {
        let due = if row.due_at <= now {
            "now".to_string()
        } else {
            format!("{}s", row.due_at - now)
        };
        println!(
            "{:<38} {:<10} {:<8} {:<10} {}",
            row.id,
            row.state.as_str(),
            row.retries_left,
            due,
            row.context
        );
        if let Some(err) = &row.last_error {
            println!("{:<38} last error: {err}", "");
        }
    }

    Ok(())
}
