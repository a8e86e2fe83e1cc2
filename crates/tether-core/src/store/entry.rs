use serde::{Deserialize, Serialize};

/// Per-key metadata, shared by both tiers and persisted in the disk index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryMeta {
    pub size_bytes: u64,
    /// Unix seconds; an entry whose expiry is at or before now is absent.
    pub expires_at: i64,
    pub last_accessed: i64,
    pub hit_count: u64,
}

impl EntryMeta {
    pub fn new(size_bytes: u64, expires_at: i64, now: i64) -> Self {
        Self {
            size_bytes,
            expires_at,
            last_accessed: now,
            hit_count: 0,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn record_hit(&mut self, now: i64) {
        self.hit_count = self.hit_count.saturating_add(1);
        self.last_accessed = now;
    }
}
