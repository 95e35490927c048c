//! # Result Cache
//!
//! Persists the materialized store keyed by a content hash over every
//! input: frameworks (in execution order), user data files, and the
//! registered ad-hoc queries and updates. A cache hit restores the final
//! graph without running any rule.
//!
//! Entries live at `<cache_dir>/cache-<64-hex>.db` as the store's native
//! on-disk representation, written through a `.tmp` sibling and renamed
//! into place so a crashed save never leaves a readable half-entry.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::framework::{BundledFile, FileKind, Framework};
use crate::inference::NamedQuery;
use crate::store::{GraphStore, StoreError};

/// Result cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache entry not found: {path}")]
    NotFound { path: PathBuf },

    #[error("cache I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Hash every inference input into a cache key.
///
/// The hash covers, in strict order: each framework in execution order
/// (name, tier, version, then files grouped by kind name and sorted by
/// path: path, kind, raw bytes); each user data file in sorted path order
/// (path, bytes); each registered CONSTRUCT and UPDATE in registration
/// order (text, name).
pub fn compute_key(
    frameworks: &[&Framework],
    data_files: &[PathBuf],
    constructs: &[NamedQuery],
    updates: &[NamedQuery],
) -> CacheResult<String> {
    let mut hasher = Sha256::new();

    for framework in frameworks {
        hasher.update(framework.name.as_bytes());
        hasher.update(framework.tier.as_str().as_bytes());
        hasher.update(framework.version.as_bytes());

        for kind in FileKind::ALL_BY_NAME {
            let mut files: Vec<&BundledFile> = framework.files_of(kind).collect();
            files.sort_by(|a, b| a.path.cmp(&b.path));
            for file in files {
                hasher.update(file.path.to_string_lossy().as_bytes());
                hasher.update(file.kind.as_str().as_bytes());
                hasher.update(&file.content);
            }
        }
    }

    let mut sorted_data: Vec<&PathBuf> = data_files.iter().collect();
    sorted_data.sort();
    for path in sorted_data {
        hasher.update(path.to_string_lossy().as_bytes());
        let bytes = fs::read(path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        hasher.update(&bytes);
    }

    for query in constructs {
        hasher.update(query.text.as_bytes());
        hasher.update(query.name.as_bytes());
    }
    for query in updates {
        hasher.update(query.text.as_bytes());
        hasher.update(query.name.as_bytes());
    }

    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Content-addressed store cache rooted at one directory.
pub struct ResultCache {
    cache_dir: PathBuf,
}

impl ResultCache {
    /// Open a cache rooted at `cache_dir`, creating it if needed.
    pub fn new(cache_dir: &Path) -> CacheResult<Self> {
        fs::create_dir_all(cache_dir).map_err(|source| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source,
        })?;
        Ok(ResultCache {
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    /// Path of the entry for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("cache-{key}.db"))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }

    /// Persist `store` under `key`. The dump goes into a fresh on-disk
    /// store at a `.tmp` sibling which is renamed over the final path only
    /// after a complete write.
    pub fn save(&self, store: &GraphStore, key: &str) -> CacheResult<PathBuf> {
        let entry = self.entry_path(key);
        let tmp = self.cache_dir.join(format!("cache-{key}.tmp"));
        if tmp.exists() {
            fs::remove_dir_all(&tmp).map_err(|source| CacheError::Io {
                path: tmp.clone(),
                source,
            })?;
        }

        let dump = store.dump_nquads()?;
        {
            let file_store = GraphStore::open(&tmp)?;
            file_store.load_nquads(&dump)?;
            file_store.flush()?;
        }

        fs::rename(&tmp, &entry).map_err(|source| CacheError::Io {
            path: entry.clone(),
            source,
        })?;
        info!(key, path = %entry.display(), "saved inference result to cache");
        Ok(entry)
    }

    /// Restore the store saved under `key` into a fresh in-memory store.
    pub fn load(&self, key: &str) -> CacheResult<GraphStore> {
        let entry = self.entry_path(key);
        if !entry.exists() {
            return Err(CacheError::NotFound { path: entry });
        }

        let dump = {
            let file_store = GraphStore::open(&entry)?;
            file_store.dump_nquads()?
        };
        let store = GraphStore::new()?;
        store.load_nquads(&dump)?;
        debug!(key, "loaded inference result from cache");
        Ok(store)
    }

    /// Delete the entry for `key`, if present.
    pub fn remove(&self, key: &str) -> CacheResult<()> {
        let entry = self.entry_path(key);
        if entry.is_dir() {
            fs::remove_dir_all(&entry).map_err(|source| CacheError::Io {
                path: entry.clone(),
                source,
            })?;
            info!(key, "removed cache entry");
        } else if entry.is_file() {
            fs::remove_file(&entry).map_err(|source| CacheError::Io {
                path: entry.clone(),
                source,
            })?;
            info!(key, "removed cache entry");
        }
        Ok(())
    }

    /// Delete every entry in the cache directory.
    pub fn clear(&self) -> CacheResult<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir).map_err(|source| CacheError::Io {
                path: self.cache_dir.clone(),
                source,
            })?;
        }
        fs::create_dir_all(&self.cache_dir).map_err(|source| CacheError::Io {
            path: self.cache_dir.clone(),
            source,
        })?;
        Ok(())
    }
}
