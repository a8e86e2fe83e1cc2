//! Wall-clock helpers for persisted timestamps.
//!
//! Monotonic timing (backoff deadlines, probe timing) uses `tokio::time` /
//! `std::time::Instant` directly; unix seconds are only for state that must
//! survive a restart (cache expiry, history records, queue rows).

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as unix seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
