use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use super::{
    hash_bytes, hash_file, hash_watched_files, CacheError, CacheFingerprint, Result,
    CACHE_VERSION, ENTRY_EXTENSION,
};

/// Caching collaborator consulted by the cache-lookup stage
pub trait CacheStore: Send + Sync {
    /// Cached output of `stage` for `source`, if the fingerprint and the
    /// watched files are unchanged
    fn lookup(
        &self,
        stage: &str,
        fingerprint: &CacheFingerprint,
        source: &Path,
    ) -> Result<Option<Vec<u8>>>;

    fn store(
        &self,
        stage: &str,
        fingerprint: &CacheFingerprint,
        source: &Path,
        output: &[u8],
    ) -> Result<()>;
}

/// A stored stage result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub stage: String,
    pub source_path: PathBuf,
    pub output: Vec<u8>,
}

impl CacheEntry {
    pub fn new(stage: &str, source_path: &Path, output: &[u8]) -> Self {
        Self {
            version: CACHE_VERSION,
            stage: stage.to_string(),
            source_path: source_path.to_path_buf(),
            output: output.to_vec(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(CacheError::from)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(CacheError::from)
    }
}

/// On-disk store under `<project>/node_modules/.cache/<stage>/`
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    project_root: PathBuf,
    cache_dir: PathBuf,
}

impl DiskCacheStore {
    /// # Arguments
    /// * `project_root` - Directory the watched files are resolved against
    /// * `cache_dir` - Cache directory, relative paths are resolved against the project root
    pub fn new(project_root: &Path, cache_dir: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            cache_dir: project_root.join(cache_dir),
        }
    }

    /// Directory holding the entries of one stage
    pub fn stage_dir(&self, stage: &str) -> PathBuf {
        self.cache_dir.join(stage)
    }

    fn entry_path(
        &self,
        stage: &str,
        fingerprint: &CacheFingerprint,
        source: &Path,
    ) -> Result<PathBuf> {
        let watched = hash_watched_files(&self.project_root, &fingerprint.watched_files)?;
        let content = hash_file(source)?;
        let key = hash_bytes(
            format!(
                "{}\0{}\0{}\0{}\0{}",
                stage,
                fingerprint.identifier(),
                watched,
                source.display(),
                content
            )
            .as_bytes(),
        );
        Ok(self
            .stage_dir(stage)
            .join(format!("{}.{}", key, ENTRY_EXTENSION)))
    }

    /// Remove every stored entry
    pub fn clear(&self) -> Result<()> {
        if self.cache_dir.exists() {
            std::fs::remove_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }
}

impl CacheStore for DiskCacheStore {
    fn lookup(
        &self,
        stage: &str,
        fingerprint: &CacheFingerprint,
        source: &Path,
    ) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(stage, fingerprint, source)?;
        if !path.exists() {
            debug!("Cache miss for {} ({})", source.display(), stage);
            return Ok(None);
        }

        let bytes = std::fs::read(&path)?;
        let entry = match CacheEntry::from_bytes(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Corrupted cache entry {:?}: {:?}", path, e);
                return Ok(None);
            }
        };

        if entry.version != CACHE_VERSION {
            warn!(
                "{}",
                CacheError::VersionMismatch {
                    expected: CACHE_VERSION,
                    found: entry.version,
                }
            );
            return Ok(None);
        }
        if entry.stage != stage {
            warn!("{}", CacheError::CorruptedEntry { path });
            return Ok(None);
        }

        debug!("Cache hit for {} ({})", source.display(), stage);
        Ok(Some(entry.output))
    }

    fn store(
        &self,
        stage: &str,
        fingerprint: &CacheFingerprint,
        source: &Path,
        output: &[u8],
    ) -> Result<()> {
        std::fs::create_dir_all(self.stage_dir(stage))?;
        let path = self.entry_path(stage, fingerprint, source)?;
        let entry = CacheEntry::new(stage, source, output);
        std::fs::write(&path, entry.to_bytes()?)?;
        Ok(())
    }
}

/// In-memory store keyed by stage, fingerprint and source path.
///
/// Does not read watched files or sources; used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<FxHashMap<(String, String, PathBuf), Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn lookup(
        &self,
        stage: &str,
        fingerprint: &CacheFingerprint,
        source: &Path,
    ) -> Result<Option<Vec<u8>>> {
        let key = (stage.to_string(), fingerprint.identifier(), source.to_path_buf());
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned())
    }

    fn store(
        &self,
        stage: &str,
        fingerprint: &CacheFingerprint,
        source: &Path,
        output: &[u8],
    ) -> Result<()> {
        let key = (stage.to_string(), fingerprint.identifier(), source.to_path_buf());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, output.to_vec());
        Ok(())
    }
}
