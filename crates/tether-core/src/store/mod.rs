//! Tiered response cache.
//!
//! A hot in-memory tier sits over a persistent disk tier (blob files plus a
//! JSON metadata index). Writes go to both tiers; memory eviction only drops
//! the hot copy, so an evicted entry is promoted back from disk on its next
//! read. Expiration is lazy: expired entries are purged on access or by
//! `sweep_expired`, and are never observable through `get` or `statistics`.
//!
//! Disk failures never surface to callers. The memory tier stays
//! authoritative and problems are logged, so a broken disk degrades the
//! cache to session-only instead of breaking reads.

mod disk;
mod entry;
mod memory;

pub use entry::EntryMeta;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::clock::unix_timestamp;
use crate::config::CacheConfig;

use disk::DiskTier;
use memory::MemoryTier;

/// Point-in-time view over live (unexpired) entries plus session hit rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entry_count: usize,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
    /// Lifetime hits summed over live entries (persisted with the index).
    pub total_hits: u64,
    /// Hits / lookups since this store was opened.
    pub hit_rate: f64,
}

struct StoreInner {
    /// Authoritative metadata for every entry, memory-resident or not.
    entries: HashMap<String, EntryMeta>,
    memory: MemoryTier,
    disk: DiskTier,
    lookups: u64,
    hits: u64,
}

impl StoreInner {
    async fn purge(&mut self, key: &str) {
        self.entries.remove(key);
        self.memory.remove(key);
        if let Err(e) = self.disk.remove_blob(key).await {
            tracing::warn!("cache blob remove failed for {key:?}: {e:#}");
        }
    }

    async fn persist_index(&self) {
        if let Err(e) = self.disk.save_index(&self.entries).await {
            tracing::warn!("cache index write failed: {e:#}");
        }
    }
}

/// Two-tier TTL cache keyed by arbitrary strings.
///
/// All operations serialize on one async mutex, so a sweep never races a
/// foreground read and eviction decisions see consistent metadata.
pub struct TieredCache {
    inner: Mutex<StoreInner>,
    max_memory_bytes: u64,
    max_entries: usize,
}

impl TieredCache {
    /// Default cache dir: `~/.local/state/tether/cache/`.
    pub fn default_dir() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tether")?;
        Ok(xdg_dirs.get_state_home().join("tether").join("cache"))
    }

    pub async fn open_default(cfg: &CacheConfig) -> Result<Self> {
        Self::open_at(&Self::default_dir()?, cfg).await
    }

    /// Open the cache rooted at `dir`, loading the persisted index. The
    /// memory tier starts cold and refills through promotion on reads.
    pub async fn open_at(dir: &Path, cfg: &CacheConfig) -> Result<Self> {
        let disk = DiskTier::open(dir).await?;
        let entries = disk.load_index().await?;
        Ok(Self {
            inner: Mutex::new(StoreInner {
                entries,
                memory: MemoryTier::default(),
                disk,
                lookups: 0,
                hits: 0,
            }),
            max_memory_bytes: cfg.max_memory_bytes,
            max_entries: cfg.max_entries.max(1),
        })
    }

    /// Store `value` under `key` for `ttl`. Replaces any existing entry and
    /// resets its hit statistics. A zero TTL produces an entry that is
    /// already expired and therefore never observable.
    pub async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let now = unix_timestamp();
        let meta = EntryMeta::new(
            value.len() as u64,
            now.saturating_add(ttl.as_secs() as i64),
            now,
        );

        let mut inner = self.inner.lock().await;
        if let Err(e) = inner.disk.write_blob(key, &value).await {
            tracing::warn!("cache blob write failed for {key:?}: {e:#}");
        }
        inner.entries.insert(key.to_string(), meta);
        inner.memory.insert(key.to_string(), value);
        self.evict_over_budget(&mut inner);
        inner.persist_index().await;
    }

    /// Look up `key`. Expired entries are purged and read as a miss; disk
    /// hits are promoted into the memory tier. Hits bump the entry's
    /// statistics (persisted with the next structural write).
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = unix_timestamp();
        let mut inner = self.inner.lock().await;
        inner.lookups = inner.lookups.saturating_add(1);

        let meta = match inner.entries.get(key) {
            Some(m) => *m,
            None => return None,
        };
        if meta.is_expired(now) {
            inner.purge(key).await;
            inner.persist_index().await;
            return None;
        }

        if let Some(bytes) = inner.memory.get(key) {
            let bytes = bytes.clone();
            if let Some(m) = inner.entries.get_mut(key) {
                m.record_hit(now);
            }
            inner.hits = inner.hits.saturating_add(1);
            return Some(bytes);
        }

        // Memory miss with live metadata: promote from disk.
        let bytes = match inner.disk.read_blob(key).await {
            Ok(b) if b.len() as u64 == meta.size_bytes => b,
            Ok(b) => {
                tracing::warn!(
                    "cache blob for {key:?} has {} bytes, expected {}; purging",
                    b.len(),
                    meta.size_bytes
                );
                inner.purge(key).await;
                inner.persist_index().await;
                return None;
            }
            Err(e) => {
                tracing::warn!("cache blob read failed for {key:?}: {e:#}");
                inner.purge(key).await;
                inner.persist_index().await;
                return None;
            }
        };
        if let Some(m) = inner.entries.get_mut(key) {
            m.record_hit(now);
        }
        inner.hits = inner.hits.saturating_add(1);
        inner.memory.insert(key.to_string(), bytes.clone());
        self.evict_over_budget(&mut inner);
        Some(bytes)
    }

    /// Remove `key` from both tiers. Returns whether a live entry was
    /// removed; repeating the call (or removing an expired key) returns
    /// false.
    pub async fn remove(&self, key: &str) -> bool {
        let now = unix_timestamp();
        let mut inner = self.inner.lock().await;
        let Some(meta) = inner.entries.get(key) else {
            return false;
        };
        let was_live = !meta.is_expired(now);
        inner.purge(key).await;
        inner.persist_index().await;
        was_live
    }

    /// Drop every entry from both tiers.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.memory.clear();
        if let Err(e) = inner.disk.clear_blobs().await {
            tracing::warn!("cache clear failed: {e:#}");
        }
        inner.persist_index().await;
    }

    /// Purge every expired entry now; returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let now = unix_timestamp();
        let mut inner = self.inner.lock().await;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, meta)| meta.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.purge(key).await;
        }
        if !expired.is_empty() {
            inner.persist_index().await;
            tracing::info!("swept {} expired cache entries", expired.len());
        }
        expired.len()
    }

    pub async fn statistics(&self) -> CacheStats {
        let now = unix_timestamp();
        let inner = self.inner.lock().await;
        let mut stats = CacheStats::default();
        for (key, meta) in &inner.entries {
            if meta.is_expired(now) {
                continue;
            }
            stats.entry_count += 1;
            stats.disk_bytes += meta.size_bytes;
            stats.total_hits += meta.hit_count;
            if inner.memory.contains(key) {
                stats.memory_bytes += meta.size_bytes;
            }
        }
        stats.hit_rate = if inner.lookups == 0 {
            0.0
        } else {
            inner.hits as f64 / inner.lookups as f64
        };
        stats
    }

    /// Periodic sweep driver for long-lived hosts; runs until the task is
    /// dropped. The first sweep fires immediately to purge entries left over
    /// from a previous run.
    pub async fn run_sweep_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_expired().await;
        }
    }

    fn evict_over_budget(&self, inner: &mut StoreInner) {
        while inner.memory.len() > self.max_entries
            || inner.memory.total_bytes() > self.max_memory_bytes
        {
            let Some(victim) = inner.memory.victim(&inner.entries) else {
                break;
            };
            inner.memory.remove(&victim);
            tracing::debug!("evicted {victim:?} from memory tier");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max_memory_bytes: u64, max_entries: usize) -> CacheConfig {
        CacheConfig {
            max_memory_bytes,
            max_entries,
            sweep_interval_secs: 3600,
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn put_get_roundtrip_and_hit_rate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();

        cache.put("users/42", b"alice".to_vec(), HOUR).await;
        assert_eq!(cache.get("users/42").await.as_deref(), Some(&b"alice"[..]));
        assert!(cache.get("users/43").await.is_none());

        let stats = cache.statistics().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_hits, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn put_replaces_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();

        cache.put("k", b"version-one".to_vec(), HOUR).await;
        cache.put("k", b"two".to_vec(), HOUR).await;

        assert_eq!(cache.get("k").await.as_deref(), Some(&b"two"[..]));
        let stats = cache.statistics().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.disk_bytes, 3);
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_never_observable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();

        cache.put("k", b"gone".to_vec(), Duration::ZERO).await;
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.statistics().await.entry_count, 0);
        // Already absent, so remove reports nothing live.
        assert!(!cache.remove("k").await);
    }

    #[tokio::test]
    async fn eviction_drops_coldest_and_disk_promotes_it_back() {
        let dir = tempfile::tempdir().unwrap();
        // Entry budget of two forces an eviction on the third insert.
        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 2))
            .await
            .unwrap();

        cache.put("a", vec![1; 3], HOUR).await;
        cache.put("b", vec![2; 5], HOUR).await;
        assert!(cache.get("a").await.is_some());

        cache.put("c", vec![3; 7], HOUR).await;

        // b had no hits, so it lost its memory slot but kept its blob.
        let stats = cache.statistics().await;
        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.disk_bytes, 15);
        assert_eq!(stats.memory_bytes, 10);

        // The read still succeeds, served from disk and promoted back.
        assert_eq!(cache.get("b").await.as_deref(), Some(&[2u8; 5][..]));
        let stats = cache.statistics().await;
        assert_eq!(stats.memory_bytes, 8);
    }

    #[tokio::test]
    async fn byte_budget_triggers_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::open_at(dir.path(), &cfg(10, 100)).await.unwrap();

        cache.put("a", vec![0; 8], HOUR).await;
        cache.put("b", vec![0; 8], HOUR).await;

        let stats = cache.statistics().await;
        assert_eq!(stats.memory_bytes, 8);
        assert_eq!(stats.disk_bytes, 16);
        assert!(cache.get("a").await.is_some());
    }

    #[tokio::test]
    async fn oversized_value_is_served_from_disk_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::open_at(dir.path(), &cfg(4, 100)).await.unwrap();

        cache.put("big", vec![9; 32], HOUR).await;
        assert_eq!(cache.statistics().await.memory_bytes, 0);
        assert_eq!(cache.get("big").await.map(|v| v.len()), Some(32));
        assert_eq!(cache.statistics().await.memory_bytes, 0);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();

        cache.put("k", b"v".to_vec(), HOUR).await;
        assert!(cache.remove("k").await);
        assert!(cache.get("k").await.is_none());
        assert!(!cache.remove("k").await);
    }

    #[tokio::test]
    async fn clear_empties_both_tiers_durably() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();

        cache.put("a", b"1".to_vec(), HOUR).await;
        cache.put("b", b"2".to_vec(), HOUR).await;
        cache.clear().await;

        let stats = cache.statistics().await;
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.disk_bytes, 0);
        assert!(cache.get("a").await.is_none());

        drop(cache);
        let reopened = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();
        assert!(reopened.get("b").await.is_none());
    }

    #[tokio::test]
    async fn sweep_purges_only_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();

        cache.put("stale", b"old".to_vec(), Duration::ZERO).await;
        cache.put("fresh", b"new".to_vec(), HOUR).await;

        assert_eq!(cache.sweep_expired().await, 1);
        assert_eq!(cache.sweep_expired().await, 0);
        assert_eq!(cache.get("fresh").await.as_deref(), Some(&b"new"[..]));
    }

    #[tokio::test]
    async fn entries_survive_reopen_via_disk_tier() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
                .await
                .unwrap();
            cache.put("persisted", b"payload".to_vec(), HOUR).await;
        }

        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();
        assert_eq!(
            cache.get("persisted").await.as_deref(),
            Some(&b"payload"[..])
        );
    }

    #[tokio::test]
    async fn corrupt_blob_reads_as_miss_and_is_purged() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
                .await
                .unwrap();
            cache.put("k", b"sixteen bytes!!!".to_vec(), HOUR).await;
        }

        // Truncate the blob behind the store's back.
        let blob_dir = dir.path().join("blobs");
        let mut entries = std::fs::read_dir(&blob_dir).unwrap();
        let blob = entries.next().unwrap().unwrap().path();
        std::fs::write(&blob, b"short").unwrap();

        let cache = TieredCache::open_at(dir.path(), &cfg(1 << 20, 100))
            .await
            .unwrap();
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.statistics().await.entry_count, 0);
    }
}
