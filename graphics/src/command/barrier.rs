//! Pending resource barriers.
//!
//! Transitions are collected here and emitted as one
//! [`RecordedCommand::ResourceBarriers`](super::RecordedCommand::ResourceBarriers)
//! right before the first command that depends on them.

use crate::resources::ResourceId;
use crate::types::ResourceStates;

/// A single state transition barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceBarrier {
    /// Transitioned resource.
    pub resource: ResourceId,
    /// Subresource index, or `None` for all subresources.
    pub subresource: Option<u32>,
    /// State before the barrier.
    pub before: ResourceStates,
    /// State after the barrier.
    pub after: ResourceStates,
}

/// A batch of barriers waiting to be flushed.
///
/// Consecutive transitions of the same subresource are folded into one
/// barrier; a chain that returns to its starting state disappears.
#[derive(Debug, Default)]
pub struct BarrierBatch {
    barriers: Vec<ResourceBarrier>,
}

impl BarrierBatch {
    /// Create a new empty barrier batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a barrier.
    pub fn add(&mut self, barrier: ResourceBarrier) {
        if barrier.before == barrier.after {
            return;
        }

        let existing = self.barriers.iter().position(|b| {
            b.resource == barrier.resource
                && b.subresource == barrier.subresource
                && b.after == barrier.before
        });

        match existing {
            Some(index) => {
                let folded = &mut self.barriers[index];
                folded.after = barrier.after;
                if folded.before == folded.after {
                    self.barriers.remove(index);
                }
            }
            None => self.barriers.push(barrier),
        }
    }

    /// Check if the batch has any barriers.
    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    /// Get the number of barriers in the batch.
    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    /// Take every queued barrier, leaving the batch empty.
    pub fn take(&mut self) -> Vec<ResourceBarrier> {
        std::mem::take(&mut self.barriers)
    }

    /// Drop all queued barriers.
    pub fn clear(&mut self) {
        self.barriers.clear();
    }
}
