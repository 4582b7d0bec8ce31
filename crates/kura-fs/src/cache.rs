//! Version-gated node cache.
//!
//! One [`FsCache`] instance lives inside each filesystem instance and is
//! shared by every call on it. An entry snapshots a node at the version
//! it was read; before an entry is served, its version is compared to
//! the live VERSION key *inside the caller's transaction* and reloaded
//! on mismatch. That bounds staleness to the transaction's own snapshot.
//!
//! # Concurrency Model
//!
//! - DashMap shards guard individual entries; no entry-level locks
//! - Concurrent refreshes of one path are last-writer-wins; the loser
//!   costs a redundant reload later, never a wrong read
//! - Payloads are cloned out, never shared by reference
//! - Entries persist until the node is deleted; there is no capacity
//!   bound, since the population is the mounted namespace

use dashmap::DashMap;
use kura_store::{DirectoryLayer, ReadTransaction};
use tracing::debug;

use crate::attr::Attr;
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::schema::{DirectorySchema, FileSchema};

/// Cached snapshot of a file: attributes plus the entire chunk sequence.
#[derive(Debug, Clone)]
pub struct FileCacheEntry {
    pub version: u64,
    pub attr: Attr,
    pub chunks: Vec<Vec<u8>>,
}

/// Cached snapshot of a directory: attributes plus child names.
#[derive(Debug, Clone)]
pub struct DirectoryCacheEntry {
    pub version: u64,
    pub attr: Attr,
    pub children: Vec<String>,
}

/// Per-instance node cache.
#[derive(Debug, Default)]
pub struct FsCache {
    files: DashMap<String, FileCacheEntry>,
    dirs: DashMap<String, DirectoryCacheEntry>,
}

impl FsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A current snapshot of the file at `path`: the cached entry if its
    /// version matches the live counter, otherwise a fresh load that
    /// replaces the cached entry.
    pub fn file_fresh<R: ReadTransaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &R,
        path: &FsPath,
    ) -> FsResult<FileCacheEntry> {
        let key = path.to_string();
        let schema = FileSchema::new(path);
        let Some(live) = schema.version(dir, tx)? else {
            self.files.remove(&key);
            return Err(FsError::not_found(path));
        };

        if let Some(entry) = self.files.get(&key) {
            if entry.version == live {
                return Ok(entry.clone());
            }
        }

        debug!(path = %path, version = live, "reloading file cache entry");
        let entry = FileCacheEntry {
            version: live,
            attr: schema.load_metadata(dir, tx)?,
            chunks: schema.load_chunks(dir, tx)?,
        };
        self.files.insert(key, entry.clone());
        Ok(entry)
    }

    /// A current snapshot of the directory at `path`; same revalidation
    /// discipline as [`FsCache::file_fresh`].
    pub fn dir_fresh<R: ReadTransaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &R,
        path: &FsPath,
    ) -> FsResult<DirectoryCacheEntry> {
        let key = path.to_string();
        let schema = DirectorySchema::new(path);
        let Some(live) = schema.version(dir, tx)? else {
            self.dirs.remove(&key);
            return Err(FsError::not_found(path));
        };

        if let Some(entry) = self.dirs.get(&key) {
            if entry.version == live {
                return Ok(entry.clone());
            }
        }

        debug!(path = %path, version = live, "reloading directory cache entry");
        let entry = DirectoryCacheEntry {
            version: live,
            attr: schema.load_metadata(dir, tx)?,
            children: schema.load_children(dir, tx)?,
        };
        self.dirs.insert(key, entry.clone());
        Ok(entry)
    }

    /// Replace the cached file entry with a payload the caller already
    /// has in hand (a committed write), avoiding a re-read.
    pub fn update_file(&self, path: &FsPath, entry: FileCacheEntry) {
        self.files.insert(path.to_string(), entry);
    }

    /// Drop the entry for a single path.
    pub fn evict(&self, path: &FsPath) {
        let key = path.to_string();
        self.files.remove(&key);
        self.dirs.remove(&key);
    }

    /// Drop the entries for a path and everything below it.
    pub fn evict_subtree(&self, path: &FsPath) {
        let key = path.to_string();
        let prefix = if path.is_root() {
            "/".to_string()
        } else {
            format!("{key}/")
        };
        self.files
            .retain(|k, _| k != &key && !k.starts_with(&prefix));
        self.dirs
            .retain(|k, _| k != &key && !k.starts_with(&prefix));
    }

    #[cfg(test)]
    pub(crate) fn file_entry_count(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: u64) -> FileCacheEntry {
        FileCacheEntry {
            version,
            attr: Attr::file(0o644, 0),
            chunks: vec![Vec::new()],
        }
    }

    #[test]
    fn test_evict_subtree() {
        let cache = FsCache::new();
        cache.update_file(&FsPath::parse("/a/x").unwrap(), entry(0));
        cache.update_file(&FsPath::parse("/a/sub/y").unwrap(), entry(0));
        cache.update_file(&FsPath::parse("/ab").unwrap(), entry(0));

        cache.evict_subtree(&FsPath::parse("/a").unwrap());
        assert_eq!(cache.file_entry_count(), 1, "/ab must survive");
    }

    #[test]
    fn test_evict_single_path() {
        let cache = FsCache::new();
        let path = FsPath::parse("/f").unwrap();
        cache.update_file(&path, entry(3));
        cache.evict(&path);
        assert_eq!(cache.file_entry_count(), 0);
    }
}
