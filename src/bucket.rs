//! The bucket node: a cache-line-sized chain link holding up to seven slots.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::slab::Slab;
use crate::slot::{HashIndex, Slot};

/// Fan-out of a single bucket node. Seven slot records (56 bytes) plus one pointer-sized
/// `next` field (8 bytes on a 64-bit target) make exactly one cache line.
pub const FANOUT: usize = 7;

/// One node in a bucket's overflow chain.
///
/// Invariant: populated slots are always a prefix of `entries[0..FANOUT]` — a slot is never
/// observed empty while a later slot in the same node is populated. This falls out of the
/// insertion discipline: a writer only ever claims the first empty slot it finds while
/// scanning from index 0.
#[repr(C)]
pub struct Bucket<K, V> {
    entries: [Slot; FANOUT],
    next: AtomicPtr<Bucket<K, V>>,
}

impl<K, V> Bucket<K, V> {
    /// Compile-time check that this bucket node is exactly one cache line. Referenced (and
    /// so evaluated) for every `K`/`V` instantiation from `CasMap`'s constructor; a violation
    /// is a hard compile error, not a release-stripped runtime check.
    pub const ASSERT_ONE_CACHE_LINE: () =
        assert!(std::mem::size_of::<Bucket<K, V>>() == 64);
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Bucket {
            entries: [
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
            ],
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl<K: PartialEq, V> Bucket<K, V> {
    /// Number of populated slots in this node only (does not walk the overflow chain).
    pub fn head_len(&self) -> usize {
        for i in 0..FANOUT {
            if self.entries[i].load().hash == 0 {
                return i;
            }
        }
        FANOUT
    }

    /// Look up `(h, k)` in this node, following the overflow chain if present.
    pub fn find(&self, h: u32, k: &K, slab: &Slab<K, V>) -> Option<HashIndex> {
        let mut node = self;
        loop {
            for i in 0..FANOUT {
                let e = node.entries[i].load();
                if e.hash == 0 {
                    return None;
                }
                if e.hash == h {
                    // SAFETY: `e.index` was published by a slot CAS, which happens-after the
                    // slab write that created it (see `Slab::insert_kv`).
                    if unsafe { slab.key(e.index) } == k {
                        return Some(e);
                    }
                }
            }
            let next = node.next.load(Ordering::Relaxed);
            if next.is_null() {
                return None;
            }
            // SAFETY: `next` is only ever set once (CAS from null) to a pointer obtained
            // from the overflow pool, and bucket nodes are never freed before the map is.
            node = unsafe { &*next };
        }
    }

    /// Insert `(h, key, val)` into this node's chain, allocating overflow nodes via
    /// `alloc_fn` as needed. Returns `true` if a new slot was published, `false` if the key
    /// already exists or the slab is exhausted.
    ///
    /// `alloc_fn` must return a pointer to a freshly allocated, zeroed `Bucket` each call; it
    /// is only actually consumed when this node wins the race to extend the chain. A loser's
    /// allocation is left unused in the overflow pool (see the overflow-pool module docs).
    pub fn insert_once<F>(&self, h: u32, key: K, val: V, slab: &Slab<K, V>, alloc_fn: &F) -> bool
    where
        K: Clone + Default,
        V: Default,
        F: Fn() -> *mut Bucket<K, V>,
    {
        let mut node = self;
        let mut claimed_idx: Option<u32> = None;
        let mut pending_val = Some(val);

        loop {
            let mut restart = false;
            for i in 0..FANOUT {
                let e = node.entries[i].load();
                if e.hash == 0 {
                    let idx = match claimed_idx {
                        Some(idx) => idx,
                        None => {
                            let v = pending_val.take().expect("value consumed twice");
                            match slab.insert_kv(key.clone(), v) {
                                Some(idx) => {
                                    claimed_idx = Some(idx);
                                    idx
                                }
                                None => return false,
                            }
                        }
                    };
                    let candidate = HashIndex::new(h, idx);
                    match node.entries[i].compare_exchange(e, candidate) {
                        Ok(()) => return true,
                        Err(_) => {
                            // Another writer claimed this slot first. Restart the scan from
                            // slot 0 of *this* node so a concurrent duplicate insert is never
                            // missed.
                            restart = true;
                            break;
                        }
                    }
                } else if e.hash == h {
                    // SAFETY: see `find`.
                    if unsafe { slab.key(e.index) } == &key {
                        if let Some(idx) = claimed_idx {
                            slab.abandon(idx);
                        }
                        return false;
                    }
                }
            }
            if restart {
                continue;
            }

            let next = node.next.load(Ordering::Relaxed);
            if !next.is_null() {
                // SAFETY: see `find`.
                node = unsafe { &*next };
                continue;
            }

            let fresh = alloc_fn();
            match node
                .next
                .compare_exchange(ptr::null_mut(), fresh, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => {
                    // SAFETY: we just won the CAS, so `fresh` is this node's successor.
                    node = unsafe { &*fresh };
                }
                Err(actual) => {
                    // Lost the race: `fresh` sits unused in the overflow pool (the documented
                    // "soft leak"), and we follow the winner's node instead.
                    // SAFETY: `actual` is a non-null pointer another thread just installed.
                    node = unsafe { &*actual };
                }
            }
        }
    }
}
