//! Key subspaces.
//!
//! A [`Subspace`] wraps the stable prefix the directory layer allocated
//! for one node and packs typed key elements under it.

use crate::error::StoreResult;
use crate::tuple::{self, Element};

/// A key prefix with pack/unpack helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// Wrap a raw prefix.
    pub fn new(prefix: Vec<u8>) -> Self {
        Self { prefix }
    }

    /// The raw prefix bytes.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Key for a named entry under this subspace.
    pub fn pack_str(&self, name: &str) -> StoreResult<Vec<u8>> {
        let mut key = self.prefix.clone();
        tuple::push_str(&mut key, name)?;
        Ok(key)
    }

    /// Key for an integer-indexed entry under this subspace.
    pub fn pack_u64(&self, index: u64) -> Vec<u8> {
        let mut key = self.prefix.clone();
        tuple::push_u64(&mut key, index);
        key
    }

    /// Decode the single element following this subspace's prefix.
    pub fn unpack(&self, key: &[u8]) -> StoreResult<Element> {
        let rest = &key[self.prefix.len()..];
        let (element, _) = tuple::decode_first(rest)?;
        Ok(element)
    }

    /// The `[begin, end)` range covering every key under this subspace.
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        (self.prefix.clone(), tuple::prefix_range_end(&self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let space = Subspace::new(vec![0x01, 0x07]);
        let key = space.pack_str("VERSION").unwrap();
        assert!(key.starts_with(space.prefix()));
        assert_eq!(space.unpack(&key).unwrap(), Element::Str("VERSION".into()));

        let key = space.pack_u64(42);
        assert_eq!(space.unpack(&key).unwrap(), Element::U64(42));
    }

    #[test]
    fn test_range_covers_packed_keys() {
        let space = Subspace::new(vec![0x01, 0x07]);
        let (begin, end) = space.range();
        let key = space.pack_u64(0);
        assert!(begin.as_slice() <= key.as_slice() && key.as_slice() < end.as_slice());
    }
}
