//! Directory schema.
//!
//! A directory's children are the allocator's registered nodes below its
//! path; its attributes and version counter live in a hidden `.` marker
//! subspace that never shows up in listings. Creating or removing any
//! node bumps the parent directory's version so cached child listings
//! invalidate.

use kura_store::{DirectoryLayer, ReadTransaction, Transaction};
use tracing::debug;

use crate::attr::Attr;
use crate::error::{FsError, FsResult};
use crate::path::{CHUNK_MARKER, FsPath, META_MARKER};
use crate::schema::meta::NodeMeta;

/// Default permission bits for the root directory.
const ROOT_MODE: u32 = 0o755;

/// Schema operations for one directory path.
pub struct DirectorySchema {
    path: FsPath,
}

impl DirectorySchema {
    pub fn new(path: &FsPath) -> Self {
        Self { path: path.clone() }
    }

    fn meta_path(&self) -> Vec<String> {
        self.path.marker(META_MARKER)
    }

    fn meta<R: ReadTransaction>(&self, dir: &DirectoryLayer, tx: &R) -> FsResult<NodeMeta> {
        let space = dir.open(tx, &self.meta_path())?;
        Ok(NodeMeta::new(space))
    }

    /// The directory's version counter, or None if the directory (or its
    /// metadata space) does not exist.
    pub fn version<R: ReadTransaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &R,
    ) -> FsResult<Option<u64>> {
        match self.meta(dir, tx) {
            Ok(meta) => meta.version(tx),
            Err(FsError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create this directory. Succeeds silently if it already exists,
    /// without resetting its metadata or touching the parent version.
    pub fn create<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        mode: u32,
        uid: u64,
        mtime: i64,
    ) -> FsResult<()> {
        if dir.exists(tx, &self.meta_path())? {
            return Ok(());
        }
        dir.create_or_open(tx, self.path.segments())?;
        let meta = NodeMeta::new(dir.create_or_open(tx, &self.meta_path())?);
        meta.init_version(tx)?;
        let mut attr = Attr::directory(mode, uid);
        attr.mtime = mtime;
        meta.store_attr(tx, &attr)?;
        self.bump_parent_version(dir, tx)?;
        debug!(path = %self.path, mode, uid, "directory created");
        Ok(())
    }

    /// Create the root directory's metadata space if missing. Unlike
    /// `create` there is no parent to notify.
    pub fn init_root<T: Transaction>(&self, dir: &DirectoryLayer, tx: &mut T) -> FsResult<bool> {
        if dir.exists(tx, &self.meta_path())? {
            return Ok(false);
        }
        dir.create_or_open(tx, self.path.segments())?;
        let meta = NodeMeta::new(dir.create_or_open(tx, &self.meta_path())?);
        meta.init_version(tx)?;
        meta.store_attr(tx, &Attr::directory(ROOT_MODE, 0))?;
        Ok(true)
    }

    /// Delete this directory and everything below it, bumping the parent
    /// version.
    pub fn delete<T: Transaction>(&self, dir: &DirectoryLayer, tx: &mut T) -> FsResult<()> {
        if !dir.remove_if_exists(tx, self.path.segments())? {
            return Err(FsError::not_found(&self.path));
        }
        self.bump_parent_version(dir, tx)?;
        debug!(path = %self.path, "directory deleted");
        Ok(())
    }

    /// Attribute record; absent attributes default.
    pub fn load_metadata<R: ReadTransaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &R,
    ) -> FsResult<Attr> {
        self.meta(dir, tx)?
            .load_attr(tx, crate::attr::ObjectType::Directory)
    }

    /// Immediate child names, hidden marker segments filtered out.
    pub fn load_children<R: ReadTransaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &R,
    ) -> FsResult<Vec<String>> {
        let children = dir.list(tx, self.path.segments())?;
        Ok(children
            .into_iter()
            .filter(|name| name != META_MARKER && name != CHUNK_MARKER)
            .collect())
    }

    pub fn set_mode<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        mode: u32,
    ) -> FsResult<()> {
        let meta = self.meta(dir, tx)?;
        meta.set_u64(tx, super::meta::KEY_MODE, mode as u64)?;
        meta.bump_version(tx)?;
        Ok(())
    }

    pub fn set_owner<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        uid: u64,
        gid: u64,
    ) -> FsResult<()> {
        let meta = self.meta(dir, tx)?;
        meta.set_u64(tx, super::meta::KEY_UID, uid)?;
        meta.set_u64(tx, super::meta::KEY_GID, gid)?;
        meta.bump_version(tx)?;
        Ok(())
    }

    pub fn set_mtime<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        mtime: i64,
    ) -> FsResult<()> {
        let meta = self.meta(dir, tx)?;
        meta.set_i64(tx, super::meta::KEY_MTIME, mtime)?;
        meta.bump_version(tx)?;
        Ok(())
    }

    /// Bump this directory's version counter.
    pub fn bump_version<T: Transaction>(&self, dir: &DirectoryLayer, tx: &mut T) -> FsResult<u64> {
        let meta = self.meta(dir, tx)?;
        Ok(meta.bump_version(tx)?)
    }

    /// Bump the parent directory's version; called whenever this node is
    /// created or removed so the parent's cached child set invalidates.
    pub fn bump_parent_version<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
    ) -> FsResult<()> {
        if let Some(parent) = self.path.parent() {
            DirectorySchema::new(&parent).bump_version(dir, tx)?;
        }
        Ok(())
    }
}
