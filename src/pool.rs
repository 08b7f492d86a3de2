//! The overflow pool: a lock-free block allocator handing out extra bucket nodes.
//!
//! A primary bucket's head node holds at most [`crate::bucket::FANOUT`] slots. Once a bucket
//! collides past that, its chain is extended with nodes carved out of this pool instead of
//! individually heap-allocated — the pool amortizes allocation over many overflow nodes at
//! once, and (like the slab) claims indices via a single atomic cursor rather than a lock.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use slog::{warn, Logger};

use crate::bucket::Bucket;

/// Bucket nodes per pool block. Chosen so a block is a few megabytes regardless of `K`/`V`
/// (a `Bucket<K, V>` is always exactly 64 bytes).
pub const BLOCK_SIZE: usize = 128 * 1024;

/// One block of pre-allocated bucket nodes plus a link to the next block.
struct Block<K, V> {
    nodes: Box<[Bucket<K, V>]>,
    cursor: AtomicUsize,
    next: AtomicPtr<Block<K, V>>,
}

impl<K, V> Block<K, V> {
    fn new() -> Box<Self> {
        let mut nodes = Vec::with_capacity(BLOCK_SIZE);
        nodes.resize_with(BLOCK_SIZE, Bucket::default);
        Box::new(Block {
            nodes: nodes.into_boxed_slice(),
            cursor: AtomicUsize::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
        })
    }

    /// Hand out one bucket node from this block or a later one, allocating a new block if
    /// this one (and, transitively, every block after it) is exhausted.
    fn get_entry(&self, log: &Logger) -> *mut Bucket<K, V> {
        let mut block = self;
        loop {
            let next = block.next.load(Ordering::Relaxed);
            if !next.is_null() {
                // SAFETY: `next` is only ever installed once via CAS below, pointing at a
                // `Block` that lives as long as the pool (never freed before it).
                block = unsafe { &*next };
                continue;
            }

            let claimed = block.cursor.fetch_add(1, Ordering::SeqCst);
            if claimed < block.nodes.len() {
                return &block.nodes[claimed] as *const Bucket<K, V> as *mut Bucket<K, V>;
            }

            // This block is exhausted (or was already, and we just over-shot the cursor).
            // Try to install a new block as its successor.
            let fresh = Box::into_raw(Block::new());
            match block
                .next
                .compare_exchange(ptr::null_mut(), fresh, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => {
                    warn!(log, "overflow pool allocated an additional block";
                        "block_size" => BLOCK_SIZE);
                    // SAFETY: we just installed `fresh` ourselves.
                    block = unsafe { &*fresh };
                }
                Err(actual) => {
                    // Lost the race to extend the pool; free our speculative block and
                    // follow the winner instead.
                    // SAFETY: `fresh` was never observed by anyone else.
                    unsafe {
                        drop(Box::from_raw(fresh));
                    }
                    // SAFETY: `actual` is a non-null pointer another thread just installed.
                    block = unsafe { &*actual };
                }
            }
        }
    }
}

impl<K, V> Drop for Block<K, V> {
    fn drop(&mut self) {
        let next = self.next.load(Ordering::Relaxed);
        if !next.is_null() {
            // SAFETY: `next`, if set, was produced by `Box::into_raw` and is owned by this
            // chain; dropping it here recursively frees the whole tail.
            unsafe {
                drop(Box::from_raw(next));
            }
        }
    }
}

/// A lazily-initialized chain of [`Block`]s.
///
/// The map holds one `OverflowPool` and calls [`OverflowPool::get_entry`] whenever a
/// bucket's head node needs a successor. No block is allocated until the first overflow.
pub struct OverflowPool<K, V> {
    head: AtomicPtr<Block<K, V>>,
}

impl<K, V> OverflowPool<K, V> {
    pub fn new() -> Self {
        OverflowPool {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Hand out a fresh bucket node, allocating the pool's first block if necessary.
    pub fn get_entry(&self, log: &Logger) -> *mut Bucket<K, V> {
        let head = self.head.load(Ordering::SeqCst);
        if !head.is_null() {
            // SAFETY: `head`, once non-null, always points at a live `Block`.
            return unsafe { &*head }.get_entry(log);
        }

        let fresh = Box::into_raw(Block::new());
        match self
            .head
            .compare_exchange(ptr::null_mut(), fresh, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                warn!(log, "overflow pool allocated its first block"; "block_size" => BLOCK_SIZE);
                unsafe { &*fresh }.get_entry(log)
            }
            Err(actual) => {
                unsafe {
                    drop(Box::from_raw(fresh));
                }
                unsafe { &*actual }.get_entry(log)
            }
        }
    }
}

impl<K, V> Drop for OverflowPool<K, V> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        if !head.is_null() {
            // SAFETY: `head` was produced by `Box::into_raw` in `get_entry`.
            unsafe {
                drop(Box::from_raw(head));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discard_log() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn get_entry_returns_distinct_nodes() {
        let pool: OverflowPool<i32, i32> = OverflowPool::new();
        let log = discard_log();
        let a = pool.get_entry(&log);
        let b = pool.get_entry(&log);
        assert_ne!(a, b);
    }

    #[test]
    fn entries_from_pool_are_empty_buckets() {
        let pool: OverflowPool<i32, i32> = OverflowPool::new();
        let log = discard_log();
        let node = pool.get_entry(&log);
        // SAFETY: pool-issued nodes live for the pool's lifetime.
        let bucket = unsafe { &*node };
        assert_eq!(bucket.head_len(), 0);
    }
}
