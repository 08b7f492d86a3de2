//! The slot record: the smallest unit exchanged via CAS in a bucket node.

use std::sync::atomic::{AtomicU64, Ordering};

/// The high bit of a tagged hash. OR'd into every hash before it is stored so that the
/// all-zero word can be reserved for "this slot has never been claimed".
pub const HASH_FLAG: u32 = 0x8000_0000;

/// Tag a raw hash value so it can never collide with the sentinel empty slot.
#[inline]
pub fn tag(raw_hash: u32) -> u32 {
    raw_hash | HASH_FLAG
}

/// A tagged hash paired with a slab index, packed into one 64-bit word.
///
/// `hash == 0` means the slot has not been claimed. Every populated slot has `hash` with
/// [`HASH_FLAG`] set, so the all-zero encoding can never be produced by [`tag`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct HashIndex {
    pub hash: u32,
    pub index: u32,
}

impl HashIndex {
    #[inline]
    pub fn new(hash: u32, index: u32) -> Self {
        HashIndex { hash, index }
    }

    #[inline]
    fn pack(self) -> u64 {
        (self.hash as u64) | ((self.index as u64) << 32)
    }

    #[inline]
    fn unpack(word: u64) -> Self {
        HashIndex {
            hash: word as u32,
            index: (word >> 32) as u32,
        }
    }
}

/// An atomic, CAS-able [`HashIndex`].
///
/// This is exactly 8 bytes: one 64-bit atomic word. Seven of these plus a pointer make up
/// one 64-byte bucket node.
#[repr(transparent)]
pub struct Slot(AtomicU64);

/// Compile-time, not release-stripped, enforcement of the cache-line-alignment assumption
/// the whole concurrency protocol relies on.
const _: () = assert!(std::mem::size_of::<Slot>() == 8);

impl Slot {
    #[inline]
    pub fn empty() -> Self {
        Slot(AtomicU64::new(0))
    }

    /// Sequentially-consistent load. Slot records are always read with the strongest
    /// ordering: readers racing writers must observe a total order on the populate step.
    #[inline]
    pub fn load(&self) -> HashIndex {
        HashIndex::unpack(self.0.load(Ordering::SeqCst))
    }

    /// Strong CAS from `current` to `new`. No spurious failure: a loss always means another
    /// writer genuinely won the slot.
    #[inline]
    pub fn compare_exchange(&self, current: HashIndex, new: HashIndex) -> Result<(), HashIndex> {
        match self.0.compare_exchange(
            current.pack(),
            new.pack(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(()),
            Err(actual) => Err(HashIndex::unpack(actual)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_one_word() {
        assert_eq!(std::mem::size_of::<Slot>(), 8);
    }

    #[test]
    fn tagging_preserves_zero_hash() {
        // A raw hash of 0 must still round-trip to a nonzero, populated word.
        let tagged = tag(0);
        assert_ne!(tagged, 0);
        assert_eq!(tagged & HASH_FLAG, HASH_FLAG);
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let hi = HashIndex::new(tag(0xdead_beef), 123_456);
        assert_eq!(HashIndex::unpack(hi.pack()), hi);
    }

    #[test]
    fn empty_slot_loads_as_zero_hash() {
        let slot = Slot::empty();
        assert_eq!(slot.load().hash, 0);
    }

    #[test]
    fn compare_exchange_publishes_value() {
        let slot = Slot::empty();
        let hi = HashIndex::new(tag(7), 3);
        slot.compare_exchange(HashIndex::default(), hi).unwrap();
        assert_eq!(slot.load(), hi);
    }

    #[test]
    fn compare_exchange_fails_on_mismatch() {
        let slot = Slot::empty();
        let hi = HashIndex::new(tag(7), 3);
        slot.compare_exchange(HashIndex::default(), hi).unwrap();

        let other = HashIndex::new(tag(8), 4);
        let err = slot
            .compare_exchange(HashIndex::default(), other)
            .unwrap_err();
        assert_eq!(err, hi);
    }
}
