//! Permission engine and the login surface.
//!
//! Permissions are the classic Unix owner/other split: the requesting
//! uid picks which mask applies, and access is granted when the stored
//! mode intersects it. Group bits are carried in metadata but not
//! evaluated.
//!
//! The login surface keeps two hidden maps under the root metadata
//! marker: `./AUTH` (username -> password digest) and `./IDMAP`
//! (username -> uid). Unknown usernames register on first login with a
//! uid drawn from a counter. Everything beyond this single entry point
//! (password policy, credential rotation) belongs to an external
//! authentication subsystem.

use kura_store::{DirectoryLayer, ReadTransaction, Transaction};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::attr;
use crate::error::{FsError, FsResult};
use crate::path::META_MARKER;

/// Owner/other mask pair for read access.
pub const READ_MASKS: (u32, u32) = (0o400, 0o004);

/// Owner/other mask pair for write access.
pub const WRITE_MASKS: (u32, u32) = (0o200, 0o002);

/// First uid handed out by the login registry.
const INITIAL_UID: u64 = 70000;

const AUTH_SEGMENT: &str = "AUTH";
const IDMAP_SEGMENT: &str = "IDMAP";
const ID_COUNTER_KEY: &str = "ID_COUNTER";

/// Evaluate a Unix owner/other permission check.
///
/// If `uid` owns the node, `owner_mask` applies; otherwise `other_mask`.
/// Access is granted when the stored mode intersects the chosen mask.
pub fn check_permission(
    stored_mode: u32,
    stored_uid: u64,
    uid: u64,
    owner_mask: u32,
    other_mask: u32,
) -> bool {
    let mask = if stored_uid == uid {
        owner_mask
    } else {
        other_mask
    };
    stored_mode & mask != 0
}

/// Computes the stored digest for a password.
pub trait PasswordHasher {
    fn digest(&self, password: &str) -> Vec<u8>;
}

/// Default digest: domain-separated SHA-256.
#[derive(Debug, Default)]
pub struct Sha256Hasher;

impl PasswordHasher for Sha256Hasher {
    fn digest(&self, password: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(b"kura-auth\0");
        hasher.update(password.as_bytes());
        hasher.finalize().to_vec()
    }
}

/// KV-backed username registry.
pub struct UserDirectory {
    hasher: Box<dyn PasswordHasher + Send + Sync>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new(Box::new(Sha256Hasher))
    }
}

impl UserDirectory {
    pub fn new(hasher: Box<dyn PasswordHasher + Send + Sync>) -> Self {
        Self { hasher }
    }

    /// Authenticate `username`, registering it with a fresh uid on first
    /// sight. Wrong passwords fail with PermissionDenied.
    pub fn login<T: Transaction>(
        &self,
        dir: &DirectoryLayer,
        tx: &mut T,
        username: &str,
        password: &str,
    ) -> FsResult<u64> {
        let digest = self.hasher.digest(password);

        let auth_path = vec![META_MARKER.to_string(), AUTH_SEGMENT.to_string()];
        let idmap_path = vec![META_MARKER.to_string(), IDMAP_SEGMENT.to_string()];
        let auth_space = dir.create_or_open(tx, &auth_path)?;
        let idmap_space = dir.create_or_open(tx, &idmap_path)?;

        match tx.get(&auth_space.pack_str(username)?)? {
            Some(stored) => {
                if stored != digest {
                    warn!(username, "login rejected: wrong password");
                    return Err(FsError::permission_denied(username));
                }
                let raw = tx
                    .get(&idmap_space.pack_str(username)?)?
                    .ok_or_else(|| FsError::Corrupt(format!("no uid mapped for {username}")))?;
                attr::decode_u64(IDMAP_SEGMENT, &raw)
                    .ok_or_else(|| FsError::Corrupt(format!("uid for {username} undecodable")))
            }
            None => {
                let uid = self.allocate_uid(dir, tx)?;
                tx.set(&idmap_space.pack_str(username)?, &attr::encode_u64(uid)?);
                tx.set(&auth_space.pack_str(username)?, &digest);
                debug!(username, uid, "registered new user");
                Ok(uid)
            }
        }
    }

    fn allocate_uid<T: Transaction>(&self, dir: &DirectoryLayer, tx: &mut T) -> FsResult<u64> {
        let root_meta = dir.create_or_open(tx, &[META_MARKER.to_string()])?;
        let counter_key = root_meta.pack_str(ID_COUNTER_KEY)?;
        let current = match tx.get(&counter_key)? {
            Some(raw) => attr::decode_u64(ID_COUNTER_KEY, &raw).unwrap_or(INITIAL_UID),
            None => INITIAL_UID,
        };
        let next = current + 1;
        tx.set(&counter_key, &attr::encode_u64(next)?);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_mask_applies_to_owner() {
        // Examples from the permission model: owner read on 0644.
        assert!(check_permission(0o644, 5, 5, 0o400, 0o004));
        // Non-owner read on 0600 is denied.
        assert!(!check_permission(0o600, 5, 6, 0o400, 0o004));
    }

    #[test]
    fn test_other_mask_applies_to_non_owner() {
        assert!(check_permission(0o604, 5, 6, 0o400, 0o004));
        assert!(!check_permission(0o640, 5, 6, 0o200, 0o002));
    }

    #[test]
    fn test_digest_is_stable_and_password_sensitive() {
        let hasher = Sha256Hasher;
        assert_eq!(hasher.digest("secret"), hasher.digest("secret"));
        assert_ne!(hasher.digest("secret"), hasher.digest("Secret"));
    }
}
