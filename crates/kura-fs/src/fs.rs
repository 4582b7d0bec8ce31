//! Filesystem facade.
//!
//! One entry point per logical filesystem call. Every call runs exactly
//! one store transaction: read-only for pure reads, read-write for
//! anything that mutates. The cache is consulted inside the transaction
//! (so revalidation sees the transaction's own snapshot) and updated or
//! evicted only after a successful commit, so an aborted transaction can
//! never leave its writes in the cache.
//!
//! Calls block until their transaction commits or fails; concurrency is
//! caller threads issuing independent calls against `&self`.

use std::time::{SystemTime, UNIX_EPOCH};

use kura_store::{Database, DirectoryLayer, ReadTransaction};
use tracing::debug;

use crate::attr::{Attr, ObjectType};
use crate::cache::{FileCacheEntry, FsCache};
use crate::error::{FsError, FsResult};
use crate::handle::HandleTable;
use crate::path::FsPath;
use crate::perm::{READ_MASKS, UserDirectory, WRITE_MASKS, check_permission};
use crate::rename;
use crate::schema::{self, DirectorySchema, FileSchema};

/// Default chunk size: 64 KiB keeps every chunk value well under common
/// per-value store limits.
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024;

/// Tunables fixed at filesystem construction.
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Fixed size of every file chunk except possibly the last.
    pub chunk_size: u64,
    /// Capacity of the open-file descriptor pool.
    pub max_open_files: usize,
    /// Depth ceiling for a single recursive move; bounds how much one
    /// transaction can be asked to relocate.
    pub max_move_depth: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_open_files: 1024,
            max_move_depth: 64,
        }
    }
}

/// The filesystem core: POSIX-like semantics over a transactional
/// ordered key-value store.
///
/// Generic over the [`Database`] contract; the kernel bridge constructs
/// one instance per mount and maps each syscall onto one method.
pub struct KuraFs<D: Database> {
    db: D,
    dir: DirectoryLayer,
    cache: FsCache,
    handles: HandleTable,
    users: UserDirectory,
    config: FsConfig,
}

impl<D: Database> KuraFs<D> {
    pub fn new(db: D) -> Self {
        Self::with_config(db, FsConfig::default())
    }

    pub fn with_config(db: D, config: FsConfig) -> Self {
        Self {
            db,
            dir: DirectoryLayer::new(),
            cache: FsCache::new(),
            handles: HandleTable::new(config.max_open_files),
            users: UserDirectory::default(),
            config,
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Create the root directory's metadata if this store has never been
    /// mounted. Idempotent.
    pub fn init_root_if_needed(&self) -> FsResult<()> {
        let created = self
            .db
            .run(|tx| DirectorySchema::new(&FsPath::root()).init_root(&self.dir, tx))?;
        if created {
            debug!("root directory initialized");
        }
        Ok(())
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Read up to `size` bytes of the file at `path` starting at
    /// `offset`. Shortens at end-of-file; an offset past end-of-file
    /// yields an empty buffer.
    pub fn read(&self, path: &str, offset: u64, size: u64, user_id: u64) -> FsResult<Vec<u8>> {
        let path = FsPath::parse(path)?;
        self.db.read(|tx| {
            let entry = self.cache.file_fresh(&self.dir, tx, &path)?;
            self.require(&path, &entry.attr, user_id, READ_MASKS)?;
            Ok(FileSchema::read_span(
                &entry.chunks,
                self.config.chunk_size,
                offset,
                size,
            ))
        })
    }

    /// Child names of the directory at `path`, in name order. The root
    /// is always listable; other directories need read permission.
    pub fn ls(&self, path: &str, user_id: u64) -> FsResult<Vec<String>> {
        let path = FsPath::parse(path)?;
        self.db.read(|tx| {
            match schema::probe_object_type(&self.dir, tx, &path)? {
                ObjectType::NotFound => return Err(FsError::not_found(&path)),
                ObjectType::File => return Err(FsError::not_a_directory(&path)),
                ObjectType::Directory => {}
            }
            let entry = self.cache.dir_fresh(&self.dir, tx, &path)?;
            if !path.is_root() {
                self.require(&path, &entry.attr, user_id, READ_MASKS)?;
            }
            Ok(entry.children)
        })
    }

    /// Attribute record for `path`. A missing node is reported in the
    /// record's object type, not as an error.
    pub fn get_attr(&self, path: &str) -> FsResult<Attr> {
        let path = FsPath::parse(path)?;
        self.db
            .read(|tx| match schema::probe_object_type(&self.dir, tx, &path)? {
                ObjectType::NotFound => Ok(Attr::not_found()),
                ObjectType::Directory => {
                    Ok(self.cache.dir_fresh(&self.dir, tx, &path)?.attr)
                }
                ObjectType::File => Ok(self.cache.file_fresh(&self.dir, tx, &path)?.attr),
            })
    }

    /// Current size of the file at `path`.
    pub fn file_size(&self, path: &str) -> FsResult<u64> {
        let path = FsPath::parse(path)?;
        self.db.read(|tx| {
            let entry = self.cache.file_fresh(&self.dir, tx, &path)?;
            Ok(FileSchema::size_of(&entry.chunks))
        })
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at `offset` into the file at `path`. A gap between
    /// the old end-of-file and `offset` reads back as zeros.
    pub fn write(&self, path: &str, data: &[u8], offset: u64, user_id: u64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        let entry = self.db.run(|tx| {
            let entry = self.cache.file_fresh(&self.dir, &*tx, &path)?;
            self.require(&path, &entry.attr, user_id, WRITE_MASKS)?;
            let (chunks, version) = FileSchema::new(&path).write(
                &self.dir,
                tx,
                &entry.chunks,
                data,
                offset,
                self.config.chunk_size,
            )?;
            Ok::<_, FsError>(FileCacheEntry {
                version,
                attr: entry.attr,
                chunks,
            })
        })?;
        self.cache.update_file(&path, entry);
        Ok(())
    }

    /// Create an empty file at `path`, owned by `user_id`.
    pub fn create_file(&self, path: &str, mode: u32, user_id: u64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        self.db.run(|tx| {
            self.check_parent_gate(tx, &path, user_id)?;
            FileSchema::new(&path).create(&self.dir, tx, mode, user_id, now())
        })
    }

    /// Create a directory at `path`, owned by `user_id`. Succeeds
    /// silently if the directory already exists.
    pub fn mkdir(&self, path: &str, mode: u32, user_id: u64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        self.db.run(|tx| {
            if schema::probe_object_type(&self.dir, &*tx, &path)? == ObjectType::File {
                return Err(FsError::already_exists(&path));
            }
            self.check_parent_gate(tx, &path, user_id)?;
            DirectorySchema::new(&path).create(&self.dir, tx, mode, user_id, now())
        })
    }

    /// Remove the directory at `path` and everything below it.
    pub fn rmdir(&self, path: &str, user_id: u64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        if path.is_root() {
            return Err(FsError::permission_denied("cannot remove root"));
        }
        self.db.run(|tx| {
            match schema::probe_object_type(&self.dir, tx, &path)? {
                ObjectType::NotFound => return Err(FsError::not_found(&path)),
                ObjectType::File => return Err(FsError::not_a_directory(&path)),
                ObjectType::Directory => {}
            }
            self.check_parent_gate(tx, &path, user_id)?;
            DirectorySchema::new(&path).delete(&self.dir, tx)
        })?;
        self.cache.evict_subtree(&path);
        Ok(())
    }

    /// Remove the file at `path`: content, metadata, and cache entry.
    pub fn clear_file_content(&self, path: &str, user_id: u64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        self.db.run(|tx| {
            match schema::probe_object_type(&self.dir, tx, &path)? {
                ObjectType::NotFound => return Err(FsError::not_found(&path)),
                ObjectType::Directory => return Err(FsError::is_a_directory(&path)),
                ObjectType::File => {}
            }
            self.check_parent_gate(tx, &path, user_id)?;
            FileSchema::new(&path).delete(&self.dir, tx)
        })?;
        self.cache.evict(&path);
        Ok(())
    }

    /// Shrink the file at `path` to `size`. Growing is a no-op: size
    /// derives from chunk contents and growth is not materialized.
    pub fn truncate(&self, path: &str, size: u64, user_id: u64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        let updated = self.db.run(|tx| {
            let entry = self.cache.file_fresh(&self.dir, &*tx, &path)?;
            self.require(&path, &entry.attr, user_id, WRITE_MASKS)?;
            let truncated = FileSchema::new(&path).truncate(
                &self.dir,
                tx,
                &entry.chunks,
                size,
                self.config.chunk_size,
            )?;
            Ok::<_, FsError>(truncated.map(|(chunks, version)| FileCacheEntry {
                version,
                attr: entry.attr,
                chunks,
            }))
        })?;
        if let Some(entry) = updated {
            self.cache.update_file(&path, entry);
        }
        Ok(())
    }

    /// Set the modification time on the node at `path`.
    pub fn set_file_time(&self, path: &str, mtime: i64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        self.db
            .run(|tx| match schema::probe_object_type(&self.dir, tx, &path)? {
                ObjectType::NotFound => Err(FsError::not_found(&path)),
                ObjectType::File => FileSchema::new(&path).set_mtime(&self.dir, tx, mtime),
                ObjectType::Directory => {
                    DirectorySchema::new(&path).set_mtime(&self.dir, tx, mtime)
                }
            })
    }

    /// Change permission bits. Only the node's owner may do this.
    pub fn chmod(&self, path: &str, mode: u32, user_id: u64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        self.db
            .run(|tx| match schema::probe_object_type(&self.dir, tx, &path)? {
                ObjectType::NotFound => Err(FsError::not_found(&path)),
                ObjectType::Directory => {
                    let entry = self.cache.dir_fresh(&self.dir, &*tx, &path)?;
                    if entry.attr.uid != user_id {
                        return Err(FsError::permission_denied(&path));
                    }
                    DirectorySchema::new(&path).set_mode(&self.dir, tx, mode)
                }
                ObjectType::File => {
                    let entry = self.cache.file_fresh(&self.dir, &*tx, &path)?;
                    if entry.attr.uid != user_id {
                        return Err(FsError::permission_denied(&path));
                    }
                    FileSchema::new(&path).set_mode(&self.dir, tx, mode)
                }
            })
    }

    /// Change ownership. Unlike chmod this carries no ownership gate.
    pub fn chown(&self, path: &str, uid: u64, gid: u64) -> FsResult<()> {
        let path = FsPath::parse(path)?;
        self.db
            .run(|tx| match schema::probe_object_type(&self.dir, tx, &path)? {
                ObjectType::NotFound => Err(FsError::not_found(&path)),
                ObjectType::Directory => {
                    DirectorySchema::new(&path).set_owner(&self.dir, tx, uid, gid)
                }
                ObjectType::File => FileSchema::new(&path).set_owner(&self.dir, tx, uid, gid),
            })
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Open the file at `path`, returning a descriptor from the bounded
    /// pool. Flags are recorded by the kernel bridge; the descriptor
    /// only tracks opens of the path.
    pub fn open(&self, path: &str, flags: u32) -> FsResult<u32> {
        let _ = flags;
        let parsed = FsPath::parse(path)?;
        self.db
            .read(|tx| match schema::probe_object_type(&self.dir, tx, &parsed)? {
                ObjectType::NotFound => Err(FsError::not_found(&parsed)),
                ObjectType::Directory => Err(FsError::is_a_directory(&parsed)),
                ObjectType::File => Ok(()),
            })?;
        self.handles.open(&parsed.to_string())
    }

    /// Release one reference to an open descriptor.
    pub fn release(&self, fd: u32) -> FsResult<()> {
        self.handles.release(fd)
    }

    // ========================================================================
    // Move
    // ========================================================================

    /// Move `old_path` to `new_path`. If `new_path` names an existing
    /// directory the source moves *into* it. The entire relocation is
    /// one transaction: it either fully commits or nothing moves.
    pub fn rename(&self, old_path: &str, new_path: &str, user_id: u64) -> FsResult<()> {
        let old = FsPath::parse(old_path)?;
        let new = FsPath::parse(new_path)?;

        self.db.run(|tx| {
            let effective =
                if schema::probe_object_type(&self.dir, tx, &new)? == ObjectType::Directory {
                    let name = old
                        .basename()
                        .ok_or_else(|| FsError::invalid_argument("cannot move the root"))?;
                    new.child(name)
                } else {
                    new.clone()
                };
            // Moving removes at the source and creates at the destination;
            // both parent directories must be writable.
            self.check_parent_gate(tx, &old, user_id)?;
            self.check_parent_gate(tx, &effective, user_id)?;
            rename::move_node(&self.dir, tx, &old, &effective, self.config.max_move_depth)
        })?;
        self.cache.evict_subtree(&old);
        Ok(())
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Authenticate a user, registering unknown usernames on first
    /// login. Returns the uid the permission engine evaluates against.
    pub fn login(&self, username: &str, password: &str) -> FsResult<u64> {
        self.db.run(|tx| self.users.login(&self.dir, tx, username, password))
    }

    // ========================================================================
    // Gates
    // ========================================================================

    fn require(&self, path: &FsPath, attr: &Attr, user_id: u64, masks: (u32, u32)) -> FsResult<()> {
        if check_permission(attr.mode, attr.uid, user_id, masks.0, masks.1) {
            Ok(())
        } else {
            debug!(path = %path, user_id, "permission denied");
            Err(FsError::permission_denied(path))
        }
    }

    /// A node can be created or removed when the user can both read and
    /// write its parent directory. The root is exempt: everyone may
    /// create and remove directly under it.
    fn check_parent_gate<R: ReadTransaction>(
        &self,
        tx: &R,
        path: &FsPath,
        user_id: u64,
    ) -> FsResult<()> {
        let Some(parent) = path.parent() else {
            return Err(FsError::invalid_argument(
                "the root cannot be created or removed",
            ));
        };
        if parent.is_root() {
            return Ok(());
        }
        let entry = self.cache.dir_fresh(&self.dir, tx, &parent)?;
        self.require(&parent, &entry.attr, user_id, WRITE_MASKS)?;
        self.require(&parent, &entry.attr, user_id, READ_MASKS)
    }
}

/// Current wall-clock time in Unix seconds.
fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
