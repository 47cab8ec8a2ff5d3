//! # Ember Core
//!
//! Engine-agnostic building blocks shared by the Ember crates:
//!
//! - [`pool`]: a compatibility-matched free list for recycled allocations
//! - [`profiling`]: Tracy macros that vanish when the `profiling` feature is off

pub mod pool;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
