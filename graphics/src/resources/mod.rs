//! GPU resources.
//!
//! - [`Buffer`] - GPU memory buffer
//! - [`Texture`] - GPU texture
//! - [`StateTracker`] - per-subresource state bookkeeping shared by both
//!
//! Resources are reference-counted with [`Arc`](std::sync::Arc). The render
//! graph never hands out raw references to pooled allocations; passes reach
//! them through graph handles that are checked on every lookup.

mod buffer;
mod state;
mod texture;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::MutexGuard;

pub use buffer::Buffer;
pub use state::{StateChange, StateLockedError, StateTracker, SubresourceStates};
pub use texture::Texture;

/// Process-unique identity of a GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Common interface of buffers and textures used by command recording.
pub trait GpuResource {
    /// Identity of the resource.
    fn id(&self) -> ResourceId;

    /// Debug name.
    fn name(&self) -> &str;

    /// Lock and return the state tracker.
    fn state(&self) -> MutexGuard<'_, StateTracker>;
}
