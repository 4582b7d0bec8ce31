//! Transactional ordered key-value contract for kura.
//!
//! This crate defines the storage surface the filesystem core is written
//! against, plus an in-process reference implementation:
//!
//! - [`ReadTransaction`] / [`Transaction`] - primitive key operations
//!   (get, set, clear, range scans) inside one atomic unit of work
//! - [`Database`] - runs a closure inside exactly one transaction,
//!   read-only or read-write
//! - [`DirectoryLayer`] - hierarchical namespace allocator mapping
//!   path-segment sequences to stable key prefixes
//! - [`Subspace`] - a key prefix with pack/unpack helpers
//! - [`MemoryStore`] - snapshot-isolated in-memory store with
//!   write-conflict detection at commit
//!
//! ## Design Decisions
//!
//! - **Optimistic concurrency**: transactions never block each other;
//!   conflicting writes are detected at commit and surfaced as
//!   [`StoreError::Conflict`]. Retry policy belongs to the caller.
//! - **Ordered keys**: element packing preserves order and prefixes, so
//!   range scans enumerate a directory's subtree contiguously.
//! - **No replication**: a networked store implementing the same traits
//!   is an external collaborator, not part of this crate.

mod directory;
mod error;
mod kv;
mod memory;
mod subspace;
pub mod tuple;

pub use directory::DirectoryLayer;
pub use error::{StoreError, StoreResult};
pub use kv::{Database, Key, ReadTransaction, Transaction, Value};
pub use memory::{MemoryStore, MemoryTransaction};
pub use subspace::Subspace;
