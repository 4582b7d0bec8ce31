//! Ordered key element encoding.
//!
//! Packs string and integer elements into byte sequences whose
//! lexicographic order matches element order, and where the packed form
//! of a path is a strict prefix of the packed form of any path below it.
//! That property is what lets the directory layer enumerate a subtree
//! with a single range scan.
//!
//! Two element types cover everything the filesystem schema stores:
//! path segments (strings) and chunk indexes (u64). Integers are encoded
//! fixed-width big-endian so numeric order equals byte order.

use crate::error::{StoreError, StoreResult};

const TAG_STR: u8 = 0x02;
const TAG_U64: u8 = 0x15;

/// A decoded key element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Str(String),
    U64(u64),
}

/// Append a string element. Strings are NUL-terminated, so interior NUL
/// bytes cannot be represented.
pub fn push_str(buf: &mut Vec<u8>, s: &str) -> StoreResult<()> {
    if s.as_bytes().contains(&0) {
        return Err(StoreError::InvalidSegment(s.to_string()));
    }
    buf.push(TAG_STR);
    buf.extend_from_slice(s.as_bytes());
    buf.push(0x00);
    Ok(())
}

/// Append a u64 element (fixed-width big-endian).
pub fn push_u64(buf: &mut Vec<u8>, n: u64) {
    buf.push(TAG_U64);
    buf.extend_from_slice(&n.to_be_bytes());
}

/// Pack a path-segment sequence.
pub fn pack_segments(segments: &[String]) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    for segment in segments {
        push_str(&mut buf, segment)?;
    }
    Ok(buf)
}

/// Decode the first element of `bytes`, returning it and the number of
/// bytes consumed.
pub fn decode_first(bytes: &[u8]) -> StoreResult<(Element, usize)> {
    match bytes.first() {
        Some(&TAG_STR) => {
            let end = bytes[1..]
                .iter()
                .position(|&b| b == 0x00)
                .ok_or_else(|| StoreError::codec("unterminated string element"))?;
            let s = std::str::from_utf8(&bytes[1..1 + end])
                .map_err(|_| StoreError::codec("string element is not UTF-8"))?;
            Ok((Element::Str(s.to_string()), end + 2))
        }
        Some(&TAG_U64) => {
            if bytes.len() < 9 {
                return Err(StoreError::codec("truncated integer element"));
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[1..9]);
            Ok((Element::U64(u64::from_be_bytes(raw)), 9))
        }
        Some(tag) => Err(StoreError::codec(format!("unknown element tag {tag:#x}"))),
        None => Err(StoreError::codec("empty key element")),
    }
}

/// Smallest byte string strictly greater than every key starting with
/// `prefix`. Used as the exclusive end of a prefix range scan.
pub fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return end;
        }
        end.pop();
    }
    // All bytes were 0xFF; no key in this store uses such a prefix.
    vec![0xFF]
}
