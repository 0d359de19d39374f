// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keccak-256 entry hashes.
//!
//! ## Example
//!
//! ```
//! use moss_core::EntryHash;
//!
//! let hash = EntryHash::digest([b"some".as_slice(), b"chunks".as_slice()]);
//! assert_eq!(hash.as_bytes().len(), 32);
//! ```
use sha3::{Digest, Keccak256};

use crate::identifiers::byte_id;

/// The length of an entry hash in bytes.
pub const HASH_LEN: usize = 32;

byte_id!(
    /// 32-byte Keccak-256 digest identifying an entry.
    ///
    /// Digests wider than 32 bytes keep their rightmost 32 bytes.
    EntryHash,
    32
);

impl EntryHash {
    /// Digest a sequence of byte chunks, in order.
    pub fn digest<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = Keccak256::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        let digest = hasher.finalize();

        let mut bytes = [0; HASH_LEN];
        bytes.copy_from_slice(&digest[digest.len() - HASH_LEN..]);
        Self::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::EntryHash;

    #[test]
    fn deterministic() {
        let first = EntryHash::digest([b"info".as_slice(), b"payload".as_slice()]);
        let second = EntryHash::digest([b"info".as_slice(), b"payload".as_slice()]);
        assert_eq!(first, second);
    }

    #[test]
    fn chunk_sensitive() {
        let first = EntryHash::digest([b"info".as_slice(), b"payload".as_slice()]);
        let second = EntryHash::digest([b"info".as_slice(), b"qayload".as_slice()]);
        assert_ne!(first, second);
    }

    #[test]
    fn known_vector() {
        // Keccak-256 of the empty input.
        let hash = EntryHash::digest([]);
        assert_eq!(
            hash.to_hex(),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
