use std::collections::HashMap;

use super::entry::EntryMeta;

/// Hot tier: payload bytes for a subset of keys. Metadata lives in the shared
/// index; this tier only tracks bytes and its own running total.
#[derive(Default)]
pub struct MemoryTier {
    bytes: HashMap<String, Vec<u8>>,
    total_bytes: u64,
}

impl MemoryTier {
    pub fn get(&self, key: &str) -> Option<&Vec<u8>> {
        self.bytes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bytes.contains_key(key)
    }

    /// Insert or replace, keeping the byte total accurate.
    pub fn insert(&mut self, key: String, value: Vec<u8>) {
        let added = value.len() as u64;
        if let Some(old) = self.bytes.insert(key, value) {
            self.total_bytes = self.total_bytes.saturating_sub(old.len() as u64);
        }
        self.total_bytes = self.total_bytes.saturating_add(added);
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        let removed = self.bytes.remove(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(removed.len() as u64);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Next eviction victim: fewest hits first, then least recently accessed,
    /// then key order so selection is stable under ties.
    pub fn victim(&self, metas: &HashMap<String, EntryMeta>) -> Option<String> {
        self.bytes
            .keys()
            .filter_map(|k| metas.get(k).map(|m| (m.hit_count, m.last_accessed, k)))
            .min()
            .map(|(_, _, k)| k.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(hits: u64, accessed: i64) -> EntryMeta {
        EntryMeta {
            size_bytes: 1,
            expires_at: i64::MAX,
            last_accessed: accessed,
            hit_count: hits,
        }
    }

    #[test]
    fn byte_total_tracks_insert_replace_remove() {
        let mut tier = MemoryTier::default();
        tier.insert("a".into(), vec![0; 10]);
        tier.insert("b".into(), vec![0; 5]);
        assert_eq!(tier.total_bytes(), 15);
        tier.insert("a".into(), vec![0; 3]);
        assert_eq!(tier.total_bytes(), 8);
        tier.remove("b");
        assert_eq!(tier.total_bytes(), 3);
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn victim_prefers_fewest_hits_then_oldest_access() {
        let mut tier = MemoryTier::default();
        let mut metas = HashMap::new();
        for key in ["a", "b", "c"] {
            tier.insert(key.into(), vec![0; 4]);
        }
        metas.insert("a".to_string(), meta(5, 10));
        metas.insert("b".to_string(), meta(1, 30));
        metas.insert("c".to_string(), meta(1, 20));

        // b and c tie on hits; c was accessed earlier.
        assert_eq!(tier.victim(&metas).as_deref(), Some("c"));
        tier.remove("c");
        assert_eq!(tier.victim(&metas).as_deref(), Some("b"));
        tier.remove("b");
        assert_eq!(tier.victim(&metas).as_deref(), Some("a"));
    }
}
