//! Constant-time statistics over a map's primary bucket array.

/// A snapshot of primary-bucket occupancy and slab usage.
///
/// `get_stats` only inspects each bucket's head node, never its overflow chain — walking
/// every chain would make an operation that's supposed to be a cheap diagnostic into an
/// O(n) one. A bucket whose chain has overflowed is still counted at `els_per_bucket[7]`
/// (its head node is full), it just doesn't reveal how much further its chain runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Histogram of head-node occupancy: `els_per_bucket[i]` is the number of primary
    /// buckets whose head node holds exactly `i` populated slots, `i` in `0..=7`.
    pub els_per_bucket: [usize; 8],
    /// Slab indices claimed and later abandoned due to a duplicate-key race.
    pub unused_pairs: u32,
    /// Slab indices claimed so far (published or abandoned).
    pub all_pairs: u32,
}
