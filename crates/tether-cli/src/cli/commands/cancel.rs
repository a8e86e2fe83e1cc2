//! `tether cancel <id>` – remove a queued operation.

use anyhow::Result;

use tether_core::retry::QueueDb;

pub async fn run_cancel(id: &str) -> Result<()> {
    let db = QueueDb::open_default().await?;
    if db.remove(id).await? > 0 {
        println!("Removed queued operation {id}");
    } else {
        println!("No queued operation with id {id}");
    }
    Ok(())
}
