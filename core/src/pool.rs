//! Compatibility-matched reuse pool.
//!
//! [`ReusePool<T>`] keeps released values in a free list so the next request
//! with a compatible descriptor can take one instead of allocating. It is used
//! for GPU allocations that are recycled across frames.
//!
//! # Matching rules
//!
//! - The free list is scanned from the front (oldest first); the first
//!   compatible entry wins and is removed.
//! - Every entry that fails a compatibility check increments its failure
//!   counter. Entries that reach the eviction threshold are dropped from the
//!   pool, so the free list cannot grow without bound when requests stop
//!   matching old allocations.
//! - Released values are pushed to the back with a fresh counter.
//! - When nothing matches, the allocation callback is invoked with a
//!   monotonically increasing allocation number (starting at 1).
//!
//! # Example
//!
//! ```
//! use ember_core::pool::ReusePool;
//!
//! let mut pool = ReusePool::<Vec<u8>>::new();
//!
//! let first = pool.request(|v| v.capacity() >= 64, |_| Vec::with_capacity(64));
//! pool.release(first);
//!
//! // A compatible request reuses the released allocation.
//! let again = pool.request(|v| v.capacity() >= 32, |_| Vec::with_capacity(32));
//! assert!(again.capacity() >= 64);
//! assert_eq!(pool.allocation_count(), 1);
//! ```

use std::collections::VecDeque;

/// Number of failed compatibility checks after which a free entry is evicted.
pub const DEFAULT_EVICTION_THRESHOLD: u32 = 20;

#[derive(Debug)]
struct FreeEntry<T> {
    value: T,
    fail_count: u32,
}

/// A free list of reusable values with failure-count eviction.
#[derive(Debug)]
pub struct ReusePool<T> {
    free: VecDeque<FreeEntry<T>>,
    allocation_count: u32,
    eviction_threshold: u32,
}

impl<T> ReusePool<T> {
    /// Create an empty pool with the default eviction threshold.
    pub fn new() -> Self {
        Self::with_eviction_threshold(DEFAULT_EVICTION_THRESHOLD)
    }

    /// Create an empty pool that evicts entries after `threshold` failed checks.
    ///
    /// A threshold of zero is treated as one.
    pub fn with_eviction_threshold(threshold: u32) -> Self {
        Self {
            free: VecDeque::new(),
            allocation_count: 0,
            eviction_threshold: threshold.max(1),
        }
    }

    /// Take a compatible value from the free list, or allocate a new one.
    ///
    /// `allocate` receives the allocation number, which callers use to name
    /// the new value.
    pub fn request(
        &mut self,
        mut is_compatible: impl FnMut(&T) -> bool,
        allocate: impl FnOnce(u32) -> T,
    ) -> T {
        let mut i = 0;
        while i < self.free.len() {
            if is_compatible(&self.free[i].value) {
                if let Some(entry) = self.free.remove(i) {
                    return entry.value;
                }
            }

            let entry = &mut self.free[i];
            entry.fail_count += 1;
            if entry.fail_count >= self.eviction_threshold {
                self.free.remove(i);
                log::trace!("ReusePool: evicted entry after {} failed matches", self.eviction_threshold);
            } else {
                i += 1;
            }
        }

        self.allocation_count += 1;
        allocate(self.allocation_count)
    }

    /// Return a value to the back of the free list.
    pub fn release(&mut self, value: T) {
        self.free.push_back(FreeEntry {
            value,
            fail_count: 0,
        });
    }

    /// Number of values currently waiting in the free list.
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Total number of values allocated by this pool.
    pub fn allocation_count(&self) -> u32 {
        self.allocation_count
    }

    /// The configured eviction threshold.
    pub fn eviction_threshold(&self) -> u32 {
        self.eviction_threshold
    }

    /// Drop every free value.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

impl<T> Default for ReusePool<T> {
    fn default() -> Self {
        Self::new()
    }
}
