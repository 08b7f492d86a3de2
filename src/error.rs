//! Construction-time errors.

use quick_error::quick_error;

quick_error! {
    /// An error constructing a [`crate::CasMap`].
    ///
    /// Once a map is built, failures (slab-full, overflow-pool exhaustion) are reported
    /// through ordinary return values, not this type — see `insert`'s return value.
    #[derive(Debug)]
    pub enum Error {
        /// The supplied `Config` was invalid.
        InvalidConfig(reason: &'static str) {
            description("invalid map configuration")
            display("invalid map configuration: {}", reason)
        }
    }
}
