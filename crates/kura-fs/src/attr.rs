//! Node attribute records and their value encoding.
//!
//! Attributes are stored one key per attribute so the version counter
//! can be read and bumped without touching the rest of the record.
//! Values are postcard-encoded integers; a value that fails to decode is
//! treated as absent and the operation proceeds with defaults.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FsError, FsResult};

/// What a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    File,
    Directory,
    NotFound,
}

/// Attribute record for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    pub object_type: ObjectType,
    /// Unix permission bits (e.g. 0o644).
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    /// Last modification time, Unix seconds.
    pub mtime: i64,
}

impl Attr {
    /// Attributes for a file node.
    pub fn file(mode: u32, uid: u64) -> Self {
        Self {
            object_type: ObjectType::File,
            mode,
            uid,
            gid: uid,
            mtime: 0,
        }
    }

    /// Attributes for a directory node.
    pub fn directory(mode: u32, uid: u64) -> Self {
        Self {
            object_type: ObjectType::Directory,
            mode,
            uid,
            gid: uid,
            mtime: 0,
        }
    }

    /// The record returned when a path resolves to nothing.
    pub fn not_found() -> Self {
        Self {
            object_type: ObjectType::NotFound,
            mode: 0,
            uid: 0,
            gid: 0,
            mtime: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.object_type == ObjectType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.object_type == ObjectType::File
    }
}

/// Encode an integer attribute value.
pub fn encode_u64(value: u64) -> FsResult<Vec<u8>> {
    postcard::to_allocvec(&value).map_err(|e| FsError::Corrupt(e.to_string()))
}

/// Decode an integer attribute value; None if missing or malformed.
pub fn decode_u64(key: &str, bytes: &[u8]) -> Option<u64> {
    match postcard::from_bytes(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "attribute failed to decode, treating as absent");
            None
        }
    }
}

/// Encode a signed integer attribute value (timestamps).
pub fn encode_i64(value: i64) -> FsResult<Vec<u8>> {
    postcard::to_allocvec(&value).map_err(|e| FsError::Corrupt(e.to_string()))
}

/// Decode a signed integer attribute value; None if missing or malformed.
pub fn decode_i64(key: &str, bytes: &[u8]) -> Option<i64> {
    match postcard::from_bytes(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "attribute failed to decode, treating as absent");
            None
        }
    }
}
