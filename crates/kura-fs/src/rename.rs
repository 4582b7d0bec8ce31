//! Move orchestrator.
//!
//! Rename is a recursive copy-then-delete executed inside the caller's
//! single transaction, so a failure anywhere aborts the whole relocation
//! and nothing partial ever commits. The recursion is depth-bounded:
//! one transaction must hold the entire subtree's writes, and the bound
//! keeps that within what a store's transaction size limits can absorb.

use kura_store::{DirectoryLayer, Transaction};
use tracing::debug;

use crate::attr::ObjectType;
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::schema::{self, DirectorySchema, FileSchema};

/// Move the node at `src` to `dst`, recursively for directories.
///
/// `dst` is the effective destination (the move-into-directory rewrite
/// happens in the facade before recursion starts).
pub fn move_node<T: Transaction>(
    dir: &DirectoryLayer,
    tx: &mut T,
    src: &FsPath,
    dst: &FsPath,
    max_depth: usize,
) -> FsResult<()> {
    move_node_at(dir, tx, src, dst, max_depth, 0)
}

fn move_node_at<T: Transaction>(
    dir: &DirectoryLayer,
    tx: &mut T,
    src: &FsPath,
    dst: &FsPath,
    max_depth: usize,
    depth: usize,
) -> FsResult<()> {
    if depth >= max_depth {
        return Err(FsError::MoveTooDeep(max_depth));
    }
    debug!(src = %src, dst = %dst, depth, "moving node");

    match schema::probe_object_type(dir, tx, src)? {
        ObjectType::NotFound => Err(FsError::not_found(src)),
        ObjectType::File => FileSchema::new(src).move_to(dir, tx, dst),
        ObjectType::Directory => {
            let src_schema = DirectorySchema::new(src);
            let attr = src_schema.load_metadata(dir, tx)?;

            // Replicate the directory itself, then relocate children
            // depth-first: subdirectories before sibling files.
            let dst_schema = DirectorySchema::new(dst);
            dst_schema.create(dir, tx, attr.mode, attr.uid, attr.mtime)?;
            dst_schema.set_owner(dir, tx, attr.uid, attr.gid)?;

            let children = src_schema.load_children(dir, tx)?;
            for child in &children {
                let src_child = src.child(child);
                if schema::probe_object_type(dir, tx, &src_child)? == ObjectType::Directory {
                    move_node_at(dir, tx, &src_child, &dst.child(child), max_depth, depth + 1)?;
                }
            }
            for child in &children {
                let src_child = src.child(child);
                if schema::probe_object_type(dir, tx, &src_child)? == ObjectType::File {
                    FileSchema::new(&src_child).move_to(dir, tx, &dst.child(child))?;
                }
            }

            // All children are relocated; drop the now-empty source.
            src_schema.delete(dir, tx)
        }
    }
}
