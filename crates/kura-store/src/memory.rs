//! In-memory reference store.
//!
//! Transactions read a full snapshot taken at begin and buffer writes
//! until commit. Commit performs first-committer-wins write-write
//! conflict detection: if any key this transaction wrote was committed
//! by another transaction after this one began, the commit fails with
//! [`StoreError::Conflict`] and nothing is applied.
//!
//! The snapshot is a full clone of the keyspace, which is fine for the
//! test and single-process embedding this store exists for; a production
//! store implements the same traits over its own engine.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Included};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::kv::{Database, Key, ReadTransaction, Transaction, Value};

#[derive(Default)]
struct StoreInner {
    data: BTreeMap<Key, Value>,
    /// Commit sequence at which each key was last written or cleared.
    versions: HashMap<Key, u64>,
    commit_seq: u64,
}

/// Snapshot-isolated in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin an explicit transaction. Most callers want [`Database::read`]
    /// or [`Database::run`]; an explicit handle exists for callers that
    /// interleave several transactions (and tests that need to).
    pub fn transaction(&self) -> MemoryTransaction {
        let inner = self.inner.lock();
        MemoryTransaction {
            snapshot: inner.data.clone(),
            snapshot_seq: inner.commit_seq,
            writes: BTreeMap::new(),
        }
    }

    /// Commit an explicit transaction, applying its buffered writes.
    pub fn commit(&self, tx: MemoryTransaction) -> StoreResult<()> {
        if tx.writes.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        for key in tx.writes.keys() {
            if let Some(&committed_at) = inner.versions.get(key) {
                if committed_at > tx.snapshot_seq {
                    return Err(StoreError::Conflict);
                }
            }
        }
        inner.commit_seq += 1;
        let seq = inner.commit_seq;
        for (key, write) in tx.writes {
            match write {
                Some(value) => {
                    inner.data.insert(key.clone(), value);
                }
                None => {
                    inner.data.remove(&key);
                }
            }
            inner.versions.insert(key, seq);
        }
        Ok(())
    }
}

/// A transaction over [`MemoryStore`].
pub struct MemoryTransaction {
    snapshot: BTreeMap<Key, Value>,
    snapshot_seq: u64,
    /// Buffered writes; `None` marks a cleared key.
    writes: BTreeMap<Key, Option<Value>>,
}

impl ReadTransaction for MemoryTransaction {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Value>> {
        if let Some(write) = self.writes.get(key) {
            return Ok(write.clone());
        }
        Ok(self.snapshot.get(key).cloned())
    }

    fn get_range(&self, begin: &[u8], end: &[u8]) -> StoreResult<Vec<(Key, Value)>> {
        if begin >= end {
            return Ok(Vec::new());
        }
        let mut merged: BTreeMap<Key, Value> = self
            .snapshot
            .range::<[u8], _>((Included(begin), Excluded(end)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, write) in self.writes.range::<[u8], _>((Included(begin), Excluded(end))) {
            match write {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

impl Transaction for MemoryTransaction {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn clear(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) {
        if begin >= end {
            return;
        }
        let mut doomed: Vec<Key> = self
            .snapshot
            .range::<[u8], _>((Included(begin), Excluded(end)))
            .map(|(k, _)| k.clone())
            .collect();
        doomed.extend(
            self.writes
                .range::<[u8], _>((Included(begin), Excluded(end)))
                .map(|(k, _)| k.clone()),
        );
        for key in doomed {
            self.writes.insert(key, None);
        }
    }
}

impl Database for MemoryStore {
    type Tx = MemoryTransaction;

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self::Tx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self.transaction();
        f(&tx)
    }

    fn run<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tx = self.transaction();
        let value = f(&mut tx)?;
        self.commit(tx).map_err(E::from)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_roundtrip() {
        let store = MemoryStore::new();
        store
            .run::<_, StoreError, _>(|tx| {
                tx.set(b"k", b"v");
                Ok(())
            })
            .unwrap();
        let value = store
            .read::<_, StoreError, _>(|tx| tx.get(b"k"))
            .unwrap();
        assert_eq!(value, Some(b"v".to_vec()));
    }

    #[test]
    fn test_read_your_writes() {
        let store = MemoryStore::new();
        store
            .run::<_, StoreError, _>(|tx| {
                tx.set(b"k", b"v");
                assert_eq!(tx.get(b"k")?, Some(b"v".to_vec()));
                tx.clear(b"k");
                assert_eq!(tx.get(b"k")?, None);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_failed_closure_commits_nothing() {
        let store = MemoryStore::new();
        let result: Result<(), StoreError> = store.run(|tx| {
            tx.set(b"k", b"v");
            Err(StoreError::codec("boom"))
        });
        assert!(result.is_err());
        let value = store
            .read::<_, StoreError, _>(|tx| tx.get(b"k"))
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_range_scan_ordered() {
        let store = MemoryStore::new();
        store
            .run::<_, StoreError, _>(|tx| {
                tx.set(b"a/2", b"2");
                tx.set(b"a/1", b"1");
                tx.set(b"b/1", b"x");
                Ok(())
            })
            .unwrap();
        let pairs = store
            .read::<_, StoreError, _>(|tx| tx.get_range(b"a/", b"a0"))
            .unwrap();
        let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"a/1".as_slice(), b"a/2".as_slice()]);
    }

    #[test]
    fn test_clear_range() {
        let store = MemoryStore::new();
        store
            .run::<_, StoreError, _>(|tx| {
                tx.set(b"c/1", b"1");
                tx.set(b"c/2", b"2");
                tx.set(b"d/1", b"keep");
                Ok(())
            })
            .unwrap();
        store
            .run::<_, StoreError, _>(|tx| {
                tx.clear_range(b"c/", b"c0");
                Ok(())
            })
            .unwrap();
        store
            .read::<_, StoreError, _>(|tx| {
                assert_eq!(tx.get(b"c/1")?, None);
                assert_eq!(tx.get(b"c/2")?, None);
                assert_eq!(tx.get(b"d/1")?, Some(b"keep".to_vec()));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_write_write_conflict() {
        let store = MemoryStore::new();

        // Two transactions begun against the same snapshot, writing the
        // same key: the first commit wins, the second surfaces Conflict.
        let mut first = store.transaction();
        let mut second = store.transaction();
        first.set(b"k", b"one");
        second.set(b"k", b"two");

        store.commit(first).unwrap();
        let err = store.commit(second).unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        let value = store
            .read::<_, StoreError, _>(|tx| tx.get(b"k"))
            .unwrap();
        assert_eq!(value, Some(b"one".to_vec()));
    }

    #[test]
    fn test_disjoint_writes_both_commit() {
        let store = MemoryStore::new();
        let mut first = store.transaction();
        let mut second = store.transaction();
        first.set(b"a", b"1");
        second.set(b"b", b"2");
        store.commit(first).unwrap();
        store.commit(second).unwrap();
    }

    #[test]
    fn test_snapshot_isolation() {
        let store = MemoryStore::new();
        let reader = store.transaction();
        store
            .run::<_, StoreError, _>(|tx| {
                tx.set(b"k", b"new");
                Ok(())
            })
            .unwrap();
        // The reader still sees its begin-time snapshot.
        assert_eq!(reader.get(b"k").unwrap(), None);
    }
}
