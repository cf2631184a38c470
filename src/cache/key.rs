//! Key Normalizer Module
//!
//! Turns a caller-supplied cache name into the canonical byte key stored in
//! the backing store, applying namespace prefixing and the length ceiling.

use crate::cache::MAX_KEY_LENGTH;
use crate::error::{Result, StoreError};

// == Normalize ==
/// Converts a cache name into its canonical byte key.
///
/// The namespace, when given, is prepended as `"<namespace>:"`. Keys are
/// exact byte sequences: case-sensitive and binary-safe.
///
/// # Arguments
/// * `name` - The caller-supplied cache name
/// * `namespace` - Optional namespace partitioning the key space
///
/// # Errors
/// Returns `StoreError::KeyTooLong` if the prefixed key exceeds 255 bytes,
/// the backing store's primary-key width.
pub fn normalize(name: &str, namespace: Option<&str>) -> Result<Vec<u8>> {
    let key = match namespace {
        Some(ns) => {
            let mut key = Vec::with_capacity(ns.len() + 1 + name.len());
            key.extend_from_slice(ns.as_bytes());
            key.push(b':');
            key.extend_from_slice(name.as_bytes());
            key
        }
        None => name.as_bytes().to_vec(),
    };

    if key.len() > MAX_KEY_LENGTH {
        return Err(StoreError::KeyTooLong {
            length: key.len(),
            limit: MAX_KEY_LENGTH,
        });
    }

    Ok(key)
}

// == Namespace Prefix ==
/// Returns the byte prefix shared by every key in a namespace.
pub fn namespace_prefix(namespace: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(namespace.len() + 1);
    prefix.extend_from_slice(namespace.as_bytes());
    prefix.push(b':');
    prefix
}

// == Prefix Upper Bound ==
/// Returns the smallest byte sequence greater than every key starting with
/// `prefix`, for range scans of the form `key >= prefix AND key < upper`.
///
/// Range matching keeps namespace scoping byte-exact: namespace "x" scans
/// `[b"x:", b"x;")` and can never match keys under namespace "xy".
///
/// Returns None when no upper bound exists (prefix is all 0xff bytes), in
/// which case the scan is unbounded above.
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < 0xff {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}
