//! The hashing capability the map requires from its caller.
//!
//! The core assumes nothing about how a key is hashed beyond "some 32-bit value, ideally
//! well distributed". Implement [`Hash32`] to plug in any hash function; [`SeaHash32`]
//! is provided so ordinary key types don't need one written before a map can be built.

use std::hash::{Hash, Hasher};

/// A 32-bit hashing capability over keys of type `K`.
///
/// Unlike `std::hash::Hash`, this is the *function*, not the key's contribution to one: a
/// `Hash32` value is what the map calls to turn a key into the 32-bit value it tags and
/// indexes with.
pub trait Hash32<K: ?Sized> {
    fn hash32(&self, key: &K) -> u32;
}

/// The default hasher: folds `seahash`'s 64-bit output down to 32 bits.
///
/// `seahash` is a fast, portable, non-cryptographic hash already used elsewhere in this
/// codebase for checksumming; folding it down costs one XOR and loses no meaningful
/// distribution for a 32-bit tag.
#[derive(Clone, Copy, Default)]
pub struct SeaHash32;

impl<K: Hash + ?Sized> Hash32<K> for SeaHash32 {
    fn hash32(&self, key: &K) -> u32 {
        let mut hasher = seahash::SeaHasher::new();
        key.hash(&mut hasher);
        let h = hasher.finish();
        (h as u32) ^ ((h >> 32) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_hashes_the_same() {
        let h = SeaHash32;
        assert_eq!(h.hash32(&42i32), h.hash32(&42i32));
    }

    #[test]
    fn different_keys_usually_differ() {
        let h = SeaHash32;
        assert_ne!(h.hash32(&"alpha"), h.hash32(&"beta"));
    }

    #[test]
    fn zero_key_produces_a_hash() {
        // Nothing special is required of a zero-valued key; the sentinel handling lives in
        // the slot-tagging layer, not here.
        let h = SeaHash32;
        let _ = h.hash32(&0i32);
    }
}
