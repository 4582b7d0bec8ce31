//! Node schemas: how files and directories map onto the key space.
//!
//! Every node owns an allocator entry at its path. A directory keeps its
//! attributes under a hidden `.` marker child; a file keeps attributes
//! in its own subspace and content under a hidden `CHUNKS` child. A path
//! is a directory exactly when its `.` marker exists.

pub mod dir;
pub mod file;
pub(crate) mod meta;

pub use dir::DirectorySchema;
pub use file::FileSchema;

use kura_store::{DirectoryLayer, ReadTransaction};

use crate::attr::ObjectType;
use crate::error::{FsError, FsResult};
use crate::path::{FsPath, META_MARKER};

/// Classify what `path` currently names.
pub fn probe_object_type<R: ReadTransaction>(
    dir: &DirectoryLayer,
    tx: &R,
    path: &FsPath,
) -> FsResult<ObjectType> {
    match dir.open(tx, path.segments()) {
        Ok(_) => {
            if dir.exists(tx, &path.marker(META_MARKER))? {
                Ok(ObjectType::Directory)
            } else {
                Ok(ObjectType::File)
            }
        }
        Err(kura_store::StoreError::NotFound(_)) => Ok(ObjectType::NotFound),
        Err(e) => Err(FsError::from(e)),
    }
}
