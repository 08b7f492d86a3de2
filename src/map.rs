//! The top-level hash map tying buckets, slab, and overflow pool together.

use slog::{debug, o, Logger};

use crate::bucket::{Bucket, FANOUT};
use crate::config::Config;
use crate::error::Error;
use crate::hash::{Hash32, SeaHash32};
use crate::pool::OverflowPool;
use crate::slab::Slab;
use crate::slot::tag;
use crate::stats::Stats;

/// A lock-free, pre-allocated concurrent hash map.
///
/// `CasMap` never grows its primary bucket array or its key/value slab once built; the
/// caller picks a [`Config`] sized to the expected key cardinality up front. Inserting past
/// that cardinality is a capacity signal (`insert` returns `false`), not an error, and no
/// entry can ever be deleted once inserted. See the crate documentation for the full
/// concurrency model.
pub struct CasMap<K, V, H = SeaHash32> {
    buckets: Box<[Bucket<K, V>]>,
    slab: Slab<K, V>,
    pool: OverflowPool<K, V>,
    hasher: H,
    log: Logger,
}

impl<K, V> CasMap<K, V, SeaHash32> {
    /// Build a map with the default hasher and [`Config::default`] sizing.
    pub fn new() -> Self {
        Self::with_hasher(Config::default(), SeaHash32).expect("default config is always valid")
    }

    /// Build a map with the default hasher and a caller-supplied [`Config`].
    pub fn with_config(config: Config) -> Result<Self, Error> {
        Self::with_hasher(config, SeaHash32)
    }
}

impl<K, V, H> CasMap<K, V, H> {
    /// Build a map with a caller-supplied hasher and [`Config`].
    pub fn with_hasher(config: Config, hasher: H) -> Result<Self, Error> {
        Self::with_hasher_and_logger(config, hasher, Logger::root(slog::Discard, o!()))
    }

    /// Build a map with a caller-supplied hasher, `Config`, and `slog` logger.
    pub fn with_hasher_and_logger(config: Config, hasher: H, log: Logger) -> Result<Self, Error> {
        config.validate()?;

        // Cache-line-alignment assumption the whole concurrency protocol relies on, enforced
        // at compile time (not release-stripped) via `Bucket`'s associated const; `Slot`'s
        // own size is asserted at its definition (`slot.rs`) since it isn't generic over `K`/`V`.
        let _: () = Bucket::<K, V>::ASSERT_ONE_CACHE_LINE;

        debug!(log, "constructing map";
            "buckets" => config.buckets, "slab_capacity" => config.slab_capacity);

        let mut buckets = Vec::with_capacity(config.buckets);
        buckets.resize_with(config.buckets, Bucket::default);

        Ok(CasMap {
            buckets: buckets.into_boxed_slice(),
            slab: Slab::new(config.slab_capacity),
            pool: OverflowPool::new(),
            hasher,
            log,
        })
    }

    #[inline]
    fn bucket_for(&self, tagged_hash: u32) -> &Bucket<K, V> {
        &self.buckets[tagged_hash as usize % self.buckets.len()]
    }

    /// Total size, in bytes, of the map's primary storage (bucket array and slab). This is
    /// constant across the map's lifetime: it excludes overflow-pool blocks, which are
    /// allocated lazily and grow with collisions.
    pub fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.buckets.len() * std::mem::size_of::<Bucket<K, V>>()
            + self.slab.capacity() * std::mem::size_of::<(K, V)>()
    }

    /// Fill in a constant-time snapshot of primary-bucket occupancy and slab usage.
    pub fn get_stats(&self) -> Stats
    where
        K: PartialEq,
    {
        let mut stats = Stats::default();
        for bucket in self.buckets.iter() {
            stats.els_per_bucket[bucket.head_len()] += 1;
        }
        stats.unused_pairs = self.slab.unused_pairs();
        stats.all_pairs = self.slab.cur_pair();
        stats
    }
}

impl<K: PartialEq, V, H: Hash32<K>> CasMap<K, V, H> {
    /// Look up `key`, returning a reference to its stored value if present.
    pub fn find(&self, key: &K) -> Option<&V> {
        let tagged = tag(self.hasher.hash32(key));
        let slot = self.bucket_for(tagged).find(tagged, key, &self.slab)?;
        // SAFETY: `slot` was returned by `Bucket::find`, which only returns published slots.
        Some(unsafe { self.slab.value(slot.index) })
    }

    /// Insert `(key, value)` if `key` is not already present.
    ///
    /// Returns `true` if this call performed the insertion, `false` if `key` already existed
    /// or the slab is exhausted. Slab exhaustion is not logged — it's an expected capacity
    /// signal, not a fault. Growing a bucket chain past its head node (which lazily
    /// allocates overflow-pool blocks) does log a warning, once per block — see the
    /// `pool` module.
    pub fn insert(&self, key: K, value: V) -> bool
    where
        K: Clone + Default,
        V: Default,
    {
        let tagged = tag(self.hasher.hash32(&key));
        let bucket = self.bucket_for(tagged);
        let pool = &self.pool;
        let log = &self.log;
        let alloc_fn = move || pool.get_entry(log);
        bucket.insert_once(tagged, key, value, &self.slab, &alloc_fn)
    }
}

impl<K, V> Default for CasMap<K, V, SeaHash32> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn insert_then_find_roundtrips() {
        let m: CasMap<i32, f64> = CasMap::new();
        assert!(m.insert(1, 1.23));
        assert_eq!(*m.find(&1).unwrap(), 1.23);
    }

    #[test]
    fn duplicate_insert_is_rejected_first_write_wins() {
        let m: CasMap<i32, f64> = CasMap::new();
        assert!(m.insert(1, 1.23));
        assert!(!m.insert(1, 1.4));
        assert_eq!(*m.find(&1).unwrap(), 1.23);
    }

    #[test]
    fn missing_key_returns_none() {
        let m: CasMap<i32, f64> = CasMap::new();
        assert!(m.insert(1, 1.23));
        assert!(m.find(&2).is_none());
    }

    #[test]
    fn zero_hash_key_still_round_trips() {
        struct ZeroHasher;
        impl Hash32<i32> for ZeroHasher {
            fn hash32(&self, _key: &i32) -> u32 {
                0
            }
        }
        let m: CasMap<i32, i32, ZeroHasher> =
            CasMap::with_hasher(Config::default(), ZeroHasher).unwrap();
        assert!(m.insert(42, 99));
        assert_eq!(*m.find(&42).unwrap(), 99);
    }

    #[test]
    fn mem_size_is_constant_across_inserts() {
        let m: CasMap<i32, i32> = CasMap::new();
        let before = m.mem_size();
        for i in 0..100 {
            m.insert(i, i);
        }
        assert_eq!(m.mem_size(), before);
    }

    #[test]
    fn exact_capacity_then_one_more_fails() {
        let cfg = Config {
            buckets: 4,
            slab_capacity: 10,
        };
        let m: CasMap<i32, i32> = CasMap::with_config(cfg).unwrap();
        for i in 0..10 {
            assert!(m.insert(i, i), "insert {} should succeed", i);
        }
        assert!(!m.insert(10, 10));
        assert_eq!(m.get_stats().all_pairs, 10);
    }

    #[test]
    fn single_bucket_forces_overflow_chain() {
        struct ConstantHasher;
        impl Hash32<i32> for ConstantHasher {
            fn hash32(&self, _key: &i32) -> u32 {
                0
            }
        }
        let cfg = Config {
            buckets: 1,
            slab_capacity: 200,
        };
        let m: CasMap<i32, i32, ConstantHasher> =
            CasMap::with_hasher(cfg, ConstantHasher).unwrap();
        for i in 0..100 {
            assert!(m.insert(i, i * 2));
        }
        for i in 0..100 {
            assert_eq!(*m.find(&i).unwrap(), i * 2);
        }
        let stats = m.get_stats();
        assert_eq!(stats.els_per_bucket[FANOUT], 1);
    }

    #[test]
    fn stats_histogram_matches_actual_occupancy() {
        let cfg = Config {
            buckets: 1024,
            slab_capacity: 8192,
        };
        let m: CasMap<i32, i32> = CasMap::with_config(cfg).unwrap();
        for i in 0..4096 {
            assert!(m.insert(i, i));
        }
        let stats = m.get_stats();
        assert_eq!(stats.all_pairs, 4096);
        assert_eq!(stats.unused_pairs, 0);
        let total: usize = stats
            .els_per_bucket
            .iter()
            .enumerate()
            .map(|(i, &count)| i * count)
            .sum();
        // Every key whose chain never overflowed is fully accounted for by the histogram;
        // overflowed buckets are undercounted by design (see `Stats`' docs).
        assert!(total <= 4096);
    }

    #[test]
    fn concurrent_shared_key_race_has_exactly_one_winner() {
        let m = Arc::new(CasMap::<i32, i32>::new());
        let mut joins = Vec::new();
        for t in 0..8 {
            let m = m.clone();
            joins.push(thread::spawn(move || m.insert(42, t)));
        }
        let results: Vec<bool> = joins.into_iter().map(|j| j.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|&&r| r).count(), 1);
        assert!(m.find(&42).is_some());
        assert!(m.get_stats().unused_pairs <= 7);
    }

    #[test]
    fn concurrent_disjoint_key_storm_all_succeed() {
        let cfg = Config {
            buckets: 1024,
            slab_capacity: 8192,
        };
        let m = Arc::new(CasMap::<i32, i32>::with_config(cfg).unwrap());
        let mut joins = Vec::new();
        for t in 0..4i32 {
            let m = m.clone();
            joins.push(thread::spawn(move || {
                let mut ok = true;
                for k in (t * 1024)..((t + 1) * 1024) {
                    ok &= m.insert(k, k + 1);
                }
                ok
            }));
        }
        for j in joins {
            assert!(j.join().unwrap());
        }
        for k in 0..4096 {
            assert_eq!(*m.find(&k).unwrap(), k + 1);
        }
    }

    #[test]
    fn concurrent_inserts_find_unique_values() {
        let m = Arc::new(CasMap::<i32, i32>::new());
        let mut joins = Vec::new();
        for t in 0..4 {
            let m = m.clone();
            joins.push(thread::spawn(move || {
                for k in (t * 200)..((t + 1) * 200) {
                    m.insert(k, k);
                }
            }));
        }
        for j in joins {
            j.join().unwrap();
        }
        let found: HashSet<i32> = (0..800).filter(|k| m.find(k).is_some()).collect();
        assert_eq!(found.len(), 800);
    }
}
