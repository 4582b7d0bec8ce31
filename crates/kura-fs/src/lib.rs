//! POSIX-like filesystem semantics over a transactional ordered
//! key-value store.
//!
//! The store supplies primitive key operations, serializable
//! transactions, and a hierarchical key-space allocator (see
//! `kura-store`); this crate supplies everything filesystem-shaped on
//! top of them:
//!
//! - [`FsPath`] - path codec
//! - [`schema`] - how nodes map onto key ranges: per-attribute metadata
//!   with a version counter, and file content as a fixed-size chunk
//!   sequence
//! - [`FsCache`] - version-gated node cache, revalidated inside the
//!   active transaction
//! - [`perm`] - Unix owner/other permission evaluation and the login
//!   registry
//! - [`KuraFs`] - the facade the kernel bridge calls, one transaction
//!   per logical operation
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: every operation takes a path; the
//!   bridge handles inode bookkeeping on its side.
//! - **All-or-nothing calls**: each facade call is one transaction, so
//!   no operation - including a recursive move - partially applies.
//! - **Typed failures**: components return [`FsError`] rather than
//!   collapsing to booleans; commit conflicts stay distinguishable so
//!   the bridge can retry them.

pub mod attr;
pub mod cache;
mod error;
mod fs;
mod handle;
mod path;
pub mod perm;
mod rename;
pub mod schema;

pub use attr::{Attr, ObjectType};
pub use cache::FsCache;
pub use error::{FsError, FsResult};
pub use fs::{DEFAULT_CHUNK_SIZE, FsConfig, KuraFs};
pub use handle::{FileHandle, HandleTable};
pub use path::{CHUNK_MARKER, FsPath, META_MARKER};
pub use perm::{PasswordHasher, Sha256Hasher, UserDirectory, check_permission};
