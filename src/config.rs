//! Construction-time sizing parameters.

use crate::error::Error;

/// Default number of primary buckets, matching the original fixed-cardinality design point.
pub const DEFAULT_BUCKETS: usize = 1024;

/// Sizing parameters for a [`crate::CasMap`].
///
/// The reference design fixes `Nbuckets`/`Nelems` as compile-time constants; this crate
/// follows the allowance to move them to construction time instead; a const-generic
/// monomorphized variant is a straightforward follow-up but isn't needed by any caller yet.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of primary buckets (`Nbuckets`).
    pub buckets: usize,
    /// Capacity of the key/value slab (`Nelems`).
    pub slab_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buckets: DEFAULT_BUCKETS,
            slab_capacity: DEFAULT_BUCKETS * 8,
        }
    }
}

impl Config {
    /// A config with `buckets` primary buckets and a slab sized `buckets * 8`.
    pub fn with_buckets(buckets: usize) -> Self {
        Config {
            buckets,
            slab_capacity: buckets.saturating_mul(8),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.buckets == 0 {
            return Err(Error::InvalidConfig("buckets must be nonzero"));
        }
        if self.slab_capacity == 0 {
            return Err(Error::InvalidConfig("slab_capacity must be nonzero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_original_sizing() {
        let cfg = Config::default();
        assert_eq!(cfg.buckets, 1024);
        assert_eq!(cfg.slab_capacity, 8192);
    }

    #[test]
    fn zero_buckets_fails_validation() {
        let cfg = Config { buckets: 0, slab_capacity: 8 };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_slab_capacity_fails_validation() {
        let cfg = Config { buckets: 8, slab_capacity: 0 };
        assert!(cfg.validate().is_err());
    }
}
