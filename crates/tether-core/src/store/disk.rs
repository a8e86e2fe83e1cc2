use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use super::entry::EntryMeta;

/// Serialized metadata index, rewritten on structural mutations. Entries are
/// sorted by key so the file is deterministic for a given state.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCacheIndex {
    #[serde(default = "default_version")]
    version: u8,
    entries: Vec<PersistedCacheEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCacheEntry {
    key: String,
    meta: EntryMeta,
}

fn default_version() -> u8 {
    1
}

/// Cold tier: one blob file per key plus a JSON metadata index.
///
/// Blob files are named by the hex SHA-256 of the key, so arbitrary keys map
/// to safe file names. The index is the source of truth for which blobs are
/// live; anything else under the blob dir is ignored until `clear`.
pub struct DiskTier {
    blob_dir: PathBuf,
    index_path: PathBuf,
}

impl DiskTier {
    pub async fn open(root: &Path) -> Result<Self> {
        let blob_dir = root.join("blobs");
        fs::create_dir_all(&blob_dir)
            .await
            .with_context(|| format!("create cache dir: {}", blob_dir.display()))?;
        Ok(Self {
            blob_dir,
            index_path: root.join("index.json"),
        })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.blob_dir.join(format!("{}.bin", hex::encode(hasher.finalize())))
    }

    pub async fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(key);
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("write cache blob: {}", path.display()))
    }

    pub async fn read_blob(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(key);
        fs::read(&path)
            .await
            .with_context(|| format!("read cache blob: {}", path.display()))
    }

    /// Delete a blob; a blob that is already gone is not an error.
    pub async fn remove_blob(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove cache blob: {}", path.display())),
        }
    }

    /// Drop every blob and recreate the empty dir.
    pub async fn clear_blobs(&self) -> Result<()> {
        match fs::remove_dir_all(&self.blob_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("clear cache dir: {}", self.blob_dir.display()))
            }
        }
        fs::create_dir_all(&self.blob_dir)
            .await
            .with_context(|| format!("create cache dir: {}", self.blob_dir.display()))
    }

    pub async fn save_index(&self, entries: &HashMap<String, EntryMeta>) -> Result<()> {
        let mut persisted: Vec<PersistedCacheEntry> = entries
            .iter()
            .map(|(key, meta)| PersistedCacheEntry {
                key: key.clone(),
                meta: *meta,
            })
            .collect();
        persisted.sort_by(|a, b| a.key.cmp(&b.key));
        let snapshot = PersistedCacheIndex {
            version: 1,
            entries: persisted,
        };
        let json = serde_json::to_string_pretty(&snapshot).context("serialize cache index")?;
        fs::write(&self.index_path, json)
            .await
            .with_context(|| format!("write cache index: {}", self.index_path.display()))
    }

    /// Load the index. Missing file means a fresh cache; a corrupt index is
    /// logged and discarded (the cache is rebuildable state, not user data).
    pub async fn load_index(&self) -> Result<HashMap<String, EntryMeta>> {
        let bytes = match fs::read(&self.index_path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read cache index: {}", self.index_path.display()))
            }
        };
        match serde_json::from_slice::<PersistedCacheIndex>(&bytes) {
            Ok(snapshot) => Ok(snapshot
                .entries
                .into_iter()
                .map(|e| (e.key, e.meta))
                .collect()),
            Err(e) => {
                tracing::warn!(
                    "discarding corrupt cache index {}: {}",
                    self.index_path.display(),
                    e
                );
                Ok(HashMap::new())
            }
        }
    }
}
