//! A lock-free, pre-allocated concurrent hash map.
//!
//! `cashmap` targets workloads with a bounded, roughly-known key cardinality: every caller
//! chooses a [`Config`] sizing the primary bucket array and the key/value slab up front, and
//! the map never resizes either one. Readers and writers never take a lock — every mutating
//! operation is a compare-and-swap loop, and `find` never blocks on a concurrent `insert`.
//!
//! # Design
//!
//! The map is a fixed array of [`bucket::Bucket`] nodes. Each bucket node holds up to seven
//! [`slot::Slot`] records — 8-byte atomic cells pairing a tagged hash with an index into a
//! pre-allocated [`slab::Slab`] of `(K, V)` pairs — plus an atomic pointer chaining to an
//! overflow node if the bucket collides past seven entries. Overflow nodes themselves come
//! from a lock-free block allocator, [`pool::OverflowPool`], rather than individual
//! allocations, so extending a chain is itself wait-free modulo the allocator's own CAS.
//!
//! A bucket node is exactly one cache line (64 bytes): seven 8-byte slots plus one
//! pointer-sized forward edge. This is asserted in the test suite, not just documented.
//!
//! There is no deletion and no reclamation: every byte the map allocates — bucket array,
//! slab, and every overflow-pool block — lives until the map itself is dropped. This is what
//! lets `find` and `insert` run with nothing but plain atomics and no hazard pointers.
//!
//! See [this blog post](https://ticki.github.io/blog/an-atomic-hash-table/) for the design
//! this crate's bucket-chain layout descends from, though `cashmap` is a slab/overflow-pool
//! structure rather than the radix-tree one described there.
//!
//! # Example
//!
//! ```
//! use cashmap::CasMap;
//!
//! let map: CasMap<i32, &'static str> = CasMap::new();
//! assert!(map.insert(1, "one"));
//! assert!(!map.insert(1, "uno")); // first write wins
//! assert_eq!(map.find(&1), Some(&"one"));
//! ```

pub(crate) mod bucket;
pub mod config;
pub mod error;
pub mod hash;
mod map;
pub(crate) mod pool;
pub(crate) mod slab;
pub(crate) mod slot;
pub mod stats;

pub use config::Config;
pub use error::Error;
pub use hash::{Hash32, SeaHash32};
pub use map::CasMap;
pub use stats::Stats;
