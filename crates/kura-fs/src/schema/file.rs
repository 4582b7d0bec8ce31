//! File schema: the chunked byte store.
//!
//! File content is a sequence of fixed-size chunks stored under a hidden
//! `CHUNKS` subspace, one key per chunk index. Every chunk except
//! possibly the last is exactly `chunk_size` bytes; the last may be
//! shorter (or empty), so file size derives purely from chunk lengths.
//! Attributes and the version counter live in the file's own subspace,
//! keyed per attribute.
//!
//! Offset reads and writes operate on the full in-memory chunk sequence
//! (the cache always carries the whole sequence); writes persist only
//! the chunks they touch and bump the version once.

use kura_store::{DirectoryLayer, ReadTransaction, Transaction};
use tracing::debug;

use crate::attr::{Attr, ObjectType};
use crate::error::{FsError, FsResult};
use crate::path::{CHUNK_MARKER, FsPath};
use crate::schema::dir::DirectorySchema;
use crate::schema::meta::{self, NodeMeta};

/// Schema operations for one file path.
pub struct FileSchema {
    path: FsPath,
}

impl FileSchema {
    pub fn new(path: &FsPath) -> Self {
        Self { path: path.clone() }
    }

    fn chunks_path(&self) -> Vec<String> {
        self.path.marker(CHUNK_MARKER)
    }

    fn meta<R: ReadTransaction>(&self, dir: &DirectoryLayer, tx: &R) -> FsResult<NodeMeta> {
        let space = dir.open(tx, self.path.segments())?;
        Ok(NodeMeta::new(space))
    }

    /// The file's version counter, or None if the file does not exist.
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

    /// Create this file: allocate its subspaces, write the initial empty
    /// chunk, initialize attributes, bump the parent version.
    pub fn create<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        mode: u32,
        uid: u64,
        mtime: i64,
    ) -> FsResult<()> {
        let file_space = dir.create(tx, self.path.segments())?;
        let chunk_space = dir.create(tx, &self.chunks_path())?;

        let meta = NodeMeta::new(file_space);
        meta.init_version(tx)?;
        let mut attr = Attr::file(mode, uid);
        attr.mtime = mtime;
        meta.store_attr(tx, &attr)?;

        tx.set(&chunk_space.pack_u64(0), &[]);

        DirectorySchema::new(&self.path).bump_parent_version(dir, tx)?;
        debug!(path = %self.path, mode, uid, "file created");
        Ok(())
    }

    /// The full chunk sequence, in index order.
    pub fn load_chunks<R: ReadTransaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &R,
    ) -> FsResult<Vec<Vec<u8>>> {
        let space = dir.open(tx, &self.chunks_path())?;
        let (begin, end) = space.range();
        let mut chunks: Vec<Vec<u8>> = tx
            .get_range(&begin, &end)?
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        if chunks.is_empty() {
            // The sequence is never empty; treat a bare file as one
            // empty chunk so size arithmetic stays defined.
            chunks.push(Vec::new());
        }
        Ok(chunks)
    }

    /// Attribute record; absent attributes default.
    pub fn load_metadata<R: ReadTransaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &R,
    ) -> FsResult<Attr> {
        self.meta(dir, tx)?.load_attr(tx, ObjectType::File)
    }

    /// Total file size implied by a chunk sequence.
    pub fn size_of(chunks: &[Vec<u8>]) -> u64 {
        chunks.iter().map(|c| c.len() as u64).sum()
    }

    /// Copy `size` bytes starting at `offset` out of a chunk sequence.
    /// Reads past end-of-file shorten; an offset at or past end-of-file
    /// yields an empty buffer, not an error.
    pub fn read_span(chunks: &[Vec<u8>], chunk_size: u64, offset: u64, size: u64) -> Vec<u8> {
        let file_size = Self::size_of(chunks);
        if offset >= file_size || size == 0 {
            return Vec::new();
        }
        let wanted = size.min(file_size - offset) as usize;
        let mut out = Vec::with_capacity(wanted);
        let mut pos = offset;
        while out.len() < wanted {
            let index = (pos / chunk_size) as usize;
            let in_chunk = (pos % chunk_size) as usize;
            let Some(chunk) = chunks.get(index) else { break };
            if in_chunk >= chunk.len() {
                break;
            }
            let take = (chunk.len() - in_chunk).min(wanted - out.len());
            out.extend_from_slice(&chunk[in_chunk..in_chunk + take]);
            pos += take as u64;
        }
        out
    }

    /// Write `data` at `offset` over the pre-write chunk sequence,
    /// persisting only the chunks the write touches. Bytes of boundary
    /// chunks outside the written span are preserved; a gap between the
    /// old end-of-file and `offset` is zero-filled. Bumps the version
    /// once and returns the new sequence with its version.
    pub fn write<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        old_chunks: &[Vec<u8>],
        data: &[u8],
        offset: u64,
        chunk_size: u64,
    ) -> FsResult<(Vec<Vec<u8>>, u64)> {
        let space = dir.open(tx, &self.chunks_path())?;
        let mut chunks = old_chunks.to_vec();
        if chunks.is_empty() {
            chunks.push(Vec::new());
        }
        let mut dirty = std::collections::BTreeSet::new();

        let old_size = Self::size_of(&chunks);
        if offset > old_size {
            Self::fill(&mut chunks, &mut dirty, old_size, offset, &[], chunk_size);
        }
        Self::fill(&mut chunks, &mut dirty, offset, offset + data.len() as u64, data, chunk_size);

        // The last chunk is always strictly shorter than chunk_size; a
        // write ending exactly on a boundary gets an empty successor.
        if chunks.last().is_some_and(|c| c.len() as u64 == chunk_size) {
            chunks.push(Vec::new());
            dirty.insert(chunks.len() - 1);
        }

        for &index in &dirty {
            tx.set(&space.pack_u64(index as u64), &chunks[index]);
        }
        let version = self.meta(dir, tx)?.bump_version(tx)?;
        debug!(
            path = %self.path,
            offset,
            len = data.len(),
            chunks_written = dirty.len(),
            "file written"
        );
        Ok((chunks, version))
    }

    /// Overwrite the byte range `[from, to)` in place, growing chunks as
    /// needed. An empty `data` means zero fill.
    fn fill(
        chunks: &mut Vec<Vec<u8>>,
        dirty: &mut std::collections::BTreeSet<usize>,
        from: u64,
        to: u64,
        data: &[u8],
        chunk_size: u64,
    ) {
        let mut pos = from;
        let mut cursor = 0usize;
        while pos < to {
            let index = (pos / chunk_size) as usize;
            let in_chunk = (pos % chunk_size) as usize;
            let take = (chunk_size as usize - in_chunk).min((to - pos) as usize);
            while chunks.len() <= index {
                chunks.push(Vec::new());
            }
            let chunk = &mut chunks[index];
            if chunk.len() < in_chunk + take {
                chunk.resize(in_chunk + take, 0);
            }
            if !data.is_empty() {
                chunk[in_chunk..in_chunk + take].copy_from_slice(&data[cursor..cursor + take]);
                cursor += take;
            } else {
                chunk[in_chunk..in_chunk + take].fill(0);
            }
            dirty.insert(index);
            pos += take as u64;
        }
    }

    /// Shrink the file to `new_size`. Growth is not materialized: if
    /// `new_size` is at or past the current size this is a no-op and
    /// returns None. On shrink, chunks past the new last chunk are
    /// cleared, the new last chunk is sliced down, the version bumps
    /// once, and the new sequence is returned with its version.
    pub fn truncate<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        old_chunks: &[Vec<u8>],
        new_size: u64,
        chunk_size: u64,
    ) -> FsResult<Option<(Vec<Vec<u8>>, u64)>> {
        let mut chunks = old_chunks.to_vec();
        if chunks.is_empty() {
            chunks.push(Vec::new());
        }
        let current = Self::size_of(&chunks);
        if new_size >= current {
            return Ok(None);
        }

        let space = dir.open(tx, &self.chunks_path())?;
        let new_last = (new_size / chunk_size) as usize;
        for index in (new_last + 1)..chunks.len() {
            tx.clear(&space.pack_u64(index as u64));
        }
        chunks.truncate(new_last + 1);

        let keep = (new_size - new_last as u64 * chunk_size) as usize;
        if chunks[new_last].len() > keep {
            chunks[new_last].truncate(keep);
            tx.set(&space.pack_u64(new_last as u64), &chunks[new_last]);
        }

        let version = self.meta(dir, tx)?.bump_version(tx)?;
        debug!(path = %self.path, new_size, "file truncated");
        Ok(Some((chunks, version)))
    }

    /// Remove this file's content and metadata ranges, bumping the
    /// parent version.
    pub fn delete<T: Transaction>(&self, dir: &DirectoryLayer, tx: &mut T) -> FsResult<()> {
        if !dir.remove_if_exists(tx, self.path.segments())? {
            return Err(FsError::not_found(&self.path));
        }
        DirectorySchema::new(&self.path).bump_parent_version(dir, tx)?;
        debug!(path = %self.path, "file deleted");
        Ok(())
    }

    /// Copy this file's attributes and full chunk sequence to `dst`,
    /// then delete the original. Both live in the caller's transaction.
    pub fn move_to<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        dst: &FsPath,
    ) -> FsResult<()> {
        let attr = self.load_metadata(dir, tx)?;
        let chunks = self.load_chunks(dir, tx)?;

        let dst_schema = FileSchema::new(dst);
        dst_schema.create(dir, tx, attr.mode, attr.uid, attr.mtime)?;
        let dst_meta = dst_schema.meta(dir, tx)?;
        dst_meta.set_u64(tx, meta::KEY_GID, attr.gid)?;

        let dst_space = dir.open(tx, &dst_schema.chunks_path())?;
        for (index, chunk) in chunks.iter().enumerate() {
            tx.set(&dst_space.pack_u64(index as u64), chunk);
        }

        self.delete(dir, tx)
    }

    pub fn set_mode<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        mode: u32,
    ) -> FsResult<()> {
        let meta = self.meta(dir, tx)?;
        meta.set_u64(tx, meta::KEY_MODE, mode as u64)?;
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
        meta.set_u64(tx, meta::KEY_UID, uid)?;
        meta.set_u64(tx, meta::KEY_GID, gid)?;
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
        meta.set_i64(tx, meta::KEY_MTIME, mtime)?;
        meta.bump_version(tx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&[u8]]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.to_vec()).collect()
    }

    #[test]
    fn test_size_arithmetic() {
        assert_eq!(FileSchema::size_of(&chunks(&[b"", b""])), 0);
        assert_eq!(FileSchema::size_of(&chunks(&[b"abcd", b"ef"])), 6);
    }

    #[test]
    fn test_read_span_within_one_chunk() {
        let data = chunks(&[b"hello world"]);
        assert_eq!(FileSchema::read_span(&data, 16, 6, 5), b"world");
    }

    #[test]
    fn test_read_span_across_chunks() {
        // chunk_size 4: "abcd" "efgh" "ij"
        let data = chunks(&[b"abcd", b"efgh", b"ij"]);
        assert_eq!(FileSchema::read_span(&data, 4, 2, 6), b"cdefgh");
        assert_eq!(FileSchema::read_span(&data, 4, 0, 10), b"abcdefghij");
    }

    #[test]
    fn test_read_span_shortens_at_eof() {
        let data = chunks(&[b"abcd", b"ef"]);
        assert_eq!(FileSchema::read_span(&data, 4, 4, 100), b"ef");
    }

    #[test]
    fn test_read_span_past_eof_is_empty() {
        let data = chunks(&[b"abcd"]);
        assert!(FileSchema::read_span(&data, 4, 4, 1).is_empty());
        assert!(FileSchema::read_span(&data, 4, 99, 1).is_empty());
    }

    #[test]
    fn test_fill_preserves_boundary_bytes() {
        let mut data = chunks(&[b"abcd", b"efgh"]);
        let mut dirty = std::collections::BTreeSet::new();
        FileSchema::fill(&mut data, &mut dirty, 2, 6, b"WXYZ", 4);
        assert_eq!(data, chunks(&[b"abWX", b"YZgh"]));
        assert_eq!(dirty.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_fill_zero_gap() {
        let mut data = chunks(&[b"ab"]);
        let mut dirty = std::collections::BTreeSet::new();
        // Zero-fill from EOF (2) out to offset 9 with chunk_size 4.
        FileSchema::fill(&mut data, &mut dirty, 2, 9, &[], 4);
        assert_eq!(data, chunks(&[b"ab\0\0", b"\0\0\0\0", b"\0"]));
    }
}
