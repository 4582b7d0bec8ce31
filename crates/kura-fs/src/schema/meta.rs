//! Shared metadata helpers.
//!
//! Every node owns a metadata subspace holding one key per attribute
//! plus a VERSION counter. Files and directories compose [`NodeMeta`]
//! over their respective subspaces instead of sharing a base class: the
//! node set is closed, so the variants are plain structs.

use kura_store::{ReadTransaction, Subspace, Transaction};

use crate::attr::{self, Attr, ObjectType};
use crate::error::FsResult;

pub(crate) const KEY_VERSION: &str = "VERSION";
pub(crate) const KEY_MODE: &str = "MODE";
pub(crate) const KEY_UID: &str = "UID";
pub(crate) const KEY_GID: &str = "GID";
pub(crate) const KEY_MTIME: &str = "MTIME";

/// Attribute and version-counter access for one node's metadata subspace.
pub(crate) struct NodeMeta {
    space: Subspace,
}

impl NodeMeta {
    pub fn new(space: Subspace) -> Self {
        Self { space }
    }

    /// The node's current version counter, if one is stored.
    pub fn version<R: ReadTransaction>(&self, tx: &R) -> FsResult<Option<u64>> {
        self.get_u64(tx, KEY_VERSION)
    }

    /// Initialize the version counter to zero.
    pub fn init_version<T: Transaction>(&self, tx: &mut T) -> FsResult<()> {
        self.set_u64(tx, KEY_VERSION, 0)
    }

    /// Increment the version counter, returning the new value. A missing
    /// or undecodable counter restarts at zero.
    pub fn bump_version<T: Transaction>(&self, tx: &mut T) -> FsResult<u64> {
        let next = self.version(tx)?.map_or(0, |v| v + 1);
        self.set_u64(tx, KEY_VERSION, next)?;
        Ok(next)
    }

    /// Load the full attribute record, defaulting absent attributes.
    pub fn load_attr<R: ReadTransaction>(
        &self,
        tx: &R,
        object_type: ObjectType,
    ) -> FsResult<Attr> {
        Ok(Attr {
            object_type,
            mode: self.get_u64(tx, KEY_MODE)?.unwrap_or(0) as u32,
            uid: self.get_u64(tx, KEY_UID)?.unwrap_or(0),
            gid: self.get_u64(tx, KEY_GID)?.unwrap_or(0),
            mtime: self.get_i64(tx, KEY_MTIME)?.unwrap_or(0),
        })
    }

    /// Write the mutable attributes of `attr` (not the version counter).
    pub fn store_attr<T: Transaction>(&self, tx: &mut T, attr: &Attr) -> FsResult<()> {
        self.set_u64(tx, KEY_MODE, attr.mode as u64)?;
        self.set_u64(tx, KEY_UID, attr.uid)?;
        self.set_u64(tx, KEY_GID, attr.gid)?;
        self.set_i64(tx, KEY_MTIME, attr.mtime)?;
        Ok(())
    }

    pub fn get_u64<R: ReadTransaction>(&self, tx: &R, key: &str) -> FsResult<Option<u64>> {
        let raw = tx.get(&self.space.pack_str(key)?)?;
        Ok(raw.and_then(|bytes| attr::decode_u64(key, &bytes)))
    }

    pub fn set_u64<T: Transaction>(&self, tx: &mut T, key: &str, value: u64) -> FsResult<()> {
        tx.set(&self.space.pack_str(key)?, &attr::encode_u64(value)?);
        Ok(())
    }

    pub fn get_i64<R: ReadTransaction>(&self, tx: &R, key: &str) -> FsResult<Option<i64>> {
        let raw = tx.get(&self.space.pack_str(key)?)?;
        Ok(raw.and_then(|bytes| attr::decode_i64(key, &bytes)))
    }

    pub fn set_i64<T: Transaction>(&self, tx: &mut T, key: &str, value: i64) -> FsResult<()> {
        tx.set(&self.space.pack_str(key)?, &attr::encode_i64(value)?);
        Ok(())
    }
}
