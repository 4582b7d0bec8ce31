//! Hierarchical namespace allocator.
//!
//! Maps path-segment sequences to stable short key prefixes, so the
//! filesystem schema can address a node's keys without embedding the
//! full path in every key. The registry of known paths lives under a
//! reserved prefix; each registered node gets a disjoint data prefix
//! allocated from a counter.
//!
//! Registered paths form the namespace: `list` enumerates the direct
//! children of a node with one range scan (packing is prefix-preserving
//! and order-preserving), and `remove_if_exists` drops a node's whole
//! subtree, registry entries and data ranges both.

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::{ReadTransaction, Transaction};
use crate::subspace::Subspace;
use crate::tuple::{self, Element};

/// Registry entries live under this byte; data prefixes under `0x01`.
const REGISTRY_PREFIX: u8 = 0xFE;

/// Counter for data prefix allocation. Sorts below all data prefixes.
const ALLOC_KEY: &[u8] = b"\x00kura\x00alloc";

/// Hierarchical key-space allocator.
///
/// Stateless: every operation runs against a caller-supplied transaction,
/// so a sequence of allocator calls inside one transaction is atomic.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryLayer;

impl DirectoryLayer {
    pub fn new() -> Self {
        Self
    }

    fn registry_key(path: &[String]) -> StoreResult<Vec<u8>> {
        let mut key = vec![REGISTRY_PREFIX];
        key.extend(tuple::pack_segments(path)?);
        Ok(key)
    }

    fn allocate_prefix<T: Transaction>(&self, tx: &mut T) -> StoreResult<Vec<u8>> {
        let next = match tx.get(ALLOC_KEY)? {
            Some(raw) => {
                let mut bytes = [0u8; 8];
                if raw.len() != 8 {
                    return Err(StoreError::codec("allocator counter has wrong width"));
                }
                bytes.copy_from_slice(&raw);
                u64::from_be_bytes(bytes) + 1
            }
            None => 1,
        };
        tx.set(ALLOC_KEY, &next.to_be_bytes());
        let mut prefix = vec![0x01];
        prefix.extend_from_slice(&next.to_be_bytes());
        Ok(prefix)
    }

    /// Open the subspace registered at `path`.
    pub fn open<R: ReadTransaction>(&self, tx: &R, path: &[String]) -> StoreResult<Subspace> {
        let key = Self::registry_key(path)?;
        match tx.get(&key)? {
            Some(prefix) => Ok(Subspace::new(prefix)),
            None => Err(StoreError::not_found(path)),
        }
    }

    /// Whether a node is registered at `path`.
    pub fn exists<R: ReadTransaction>(&self, tx: &R, path: &[String]) -> StoreResult<bool> {
        let key = Self::registry_key(path)?;
        Ok(tx.get(&key)?.is_some())
    }

    /// Register `path` and allocate its data prefix. Missing ancestors
    /// are registered along the way. Fails if `path` itself is already
    /// registered.
    pub fn create<T: Transaction>(&self, tx: &mut T, path: &[String]) -> StoreResult<Subspace> {
        if self.exists(tx, path)? {
            return Err(StoreError::already_exists(path));
        }
        for depth in 0..path.len() {
            self.create_or_open(tx, &path[..depth])?;
        }
        let prefix = self.allocate_prefix(tx)?;
        let key = Self::registry_key(path)?;
        tx.set(&key, &prefix);
        debug!(path = %path.join("/"), "directory registered");
        Ok(Subspace::new(prefix))
    }

    /// Open `path`, registering it first if absent.
    pub fn create_or_open<T: Transaction>(
        &self,
        tx: &mut T,
        path: &[String],
    ) -> StoreResult<Subspace> {
        let key = Self::registry_key(path)?;
        if let Some(prefix) = tx.get(&key)? {
            return Ok(Subspace::new(prefix));
        }
        for depth in 0..path.len() {
            self.create_or_open(tx, &path[..depth])?;
        }
        let prefix = self.allocate_prefix(tx)?;
        tx.set(&key, &prefix);
        Ok(Subspace::new(prefix))
    }

    /// Names of the direct children registered under `path`, in order.
    pub fn list<R: ReadTransaction>(&self, tx: &R, path: &[String]) -> StoreResult<Vec<String>> {
        if !path.is_empty() && !self.exists(tx, path)? {
            return Err(StoreError::not_found(path));
        }
        let begin = Self::registry_key(path)?;
        let end = tuple::prefix_range_end(&begin);
        let entries = tx.get_range(&begin, &end)?;

        let mut children = Vec::new();
        for (key, _) in entries {
            if key == begin {
                continue; // the node itself
            }
            let rest = &key[begin.len()..];
            let (element, _) = tuple::decode_first(rest)?;
            let Element::Str(name) = element else {
                return Err(StoreError::codec("registry key is not a path segment"));
            };
            // Descendants of one child are contiguous; keep first of each run.
            if children.last() != Some(&name) {
                children.push(name);
            }
        }
        Ok(children)
    }

    /// Remove `path` and everything below it: registry entries and the
    /// data ranges they own. Returns false if `path` was not registered.
    pub fn remove_if_exists<T: Transaction>(
        &self,
        tx: &mut T,
        path: &[String],
    ) -> StoreResult<bool> {
        let begin = Self::registry_key(path)?;
        if tx.get(&begin)?.is_none() {
            return Ok(false);
        }
        let end = tuple::prefix_range_end(&begin);
        for (key, prefix) in tx.get_range(&begin, &end)? {
            let (data_begin, data_end) = Subspace::new(prefix).range();
            tx.clear_range(&data_begin, &data_end);
            tx.clear(&key);
        }
        debug!(path = %path.join("/"), "directory removed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::Database;
    use crate::memory::MemoryStore;

    fn segments(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_open_exists() {
        let store = MemoryStore::new();
        let dir = DirectoryLayer::new();
        let path = segments(&["tmp", "files"]);

        let created = store
            .run::<_, StoreError, _>(|tx| dir.create(tx, &path))
            .unwrap();
        let opened = store
            .read::<_, StoreError, _>(|tx| dir.open(tx, &path))
            .unwrap();
        assert_eq!(created, opened);

        // Ancestors were registered on the way down.
        assert!(
            store
                .read::<_, StoreError, _>(|tx| dir.exists(tx, &segments(&["tmp"])))
                .unwrap()
        );

        let err = store
            .run::<_, StoreError, _>(|tx| dir.create(tx, &path))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn test_list_direct_children_only() {
        let store = MemoryStore::new();
        let dir = DirectoryLayer::new();

        store
            .run::<_, StoreError, _>(|tx| {
                dir.create(tx, &segments(&["a", "x"]))?;
                dir.create(tx, &segments(&["a", "x", "deep"]))?;
                dir.create(tx, &segments(&["a", "y"]))?;
                dir.create(tx, &segments(&["ab"]))?;
                Ok(())
            })
            .unwrap();

        let children = store
            .read::<_, StoreError, _>(|tx| dir.list(tx, &segments(&["a"])))
            .unwrap();
        assert_eq!(children, vec!["x".to_string(), "y".to_string()]);

        let roots = store
            .read::<_, StoreError, _>(|tx| dir.list(tx, &[]))
            .unwrap();
        assert_eq!(roots, vec!["a".to_string(), "ab".to_string()]);
    }

    #[test]
    fn test_remove_subtree() {
        let store = MemoryStore::new();
        let dir = DirectoryLayer::new();

        store
            .run::<_, StoreError, _>(|tx| {
                let space = dir.create(tx, &segments(&["doomed"]))?;
                dir.create(tx, &segments(&["doomed", "child"]))?;
                let key = space.pack_str("DATA")?;
                tx.set(&key, b"payload");
                Ok(())
            })
            .unwrap();

        let removed = store
            .run::<_, StoreError, _>(|tx| dir.remove_if_exists(tx, &segments(&["doomed"])))
            .unwrap();
        assert!(removed);

        store
            .read::<_, StoreError, _>(|tx| {
                assert!(!dir.exists(tx, &segments(&["doomed"]))?);
                assert!(!dir.exists(tx, &segments(&["doomed", "child"]))?);
                Ok(())
            })
            .unwrap();

        let removed_again = store
            .run::<_, StoreError, _>(|tx| dir.remove_if_exists(tx, &segments(&["doomed"])))
            .unwrap();
        assert!(!removed_again);
    }
}
