//! GPU-visible resource states and queue kinds.

use bitflags::bitflags;

bitflags! {
    /// Access states a resource (or subresource) can be in.
    ///
    /// An empty set is the `COMMON` state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceStates: u32 {
        /// Vertex or constant buffer reads.
        const VERTEX_AND_CONSTANT_BUFFER = 1 << 0;
        /// Index buffer reads.
        const INDEX_BUFFER = 1 << 1;
        /// Color attachment writes.
        const RENDER_TARGET = 1 << 2;
        /// Unordered (read-write) shader access.
        const UNORDERED_ACCESS = 1 << 3;
        /// Depth/stencil writes.
        const DEPTH_WRITE = 1 << 4;
        /// Depth/stencil reads.
        const DEPTH_READ = 1 << 5;
        /// Reads from non-pixel shader stages.
        const NON_PIXEL_SHADER_RESOURCE = 1 << 6;
        /// Reads from the pixel shader.
        const PIXEL_SHADER_RESOURCE = 1 << 7;
        /// Indirect argument reads.
        const INDIRECT_ARGUMENT = 1 << 8;
        /// Copy destination.
        const COPY_DEST = 1 << 9;
        /// Copy source.
        const COPY_SOURCE = 1 << 10;
        /// Predication buffer reads.
        const PREDICATION = 1 << 11;
    }
}

impl ResourceStates {
    /// The common state, usable by every queue without a transition.
    pub const COMMON: Self = Self::empty();

    /// Every read state, which can be held at once.
    ///
    /// A resource in this state can be read from any queue without a barrier.
    pub const GENERIC_READ: Self = Self::VERTEX_AND_CONSTANT_BUFFER
        .union(Self::INDEX_BUFFER)
        .union(Self::NON_PIXEL_SHADER_RESOURCE)
        .union(Self::PIXEL_SHADER_RESOURCE)
        .union(Self::INDIRECT_ARGUMENT)
        .union(Self::COPY_SOURCE);

    /// Shader reads from every stage.
    pub const ALL_SHADER_RESOURCE: Self =
        Self::NON_PIXEL_SHADER_RESOURCE.union(Self::PIXEL_SHADER_RESOURCE);

    /// Whether being in `self` already satisfies a request for `target`.
    ///
    /// `COMMON` is only satisfied by `COMMON` itself.
    pub fn satisfies(&self, target: ResourceStates) -> bool {
        if target == Self::COMMON {
            *self == Self::COMMON
        } else {
            self.contains(target)
        }
    }
}

/// Kind of GPU queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum QueueType {
    /// Graphics queue; accepts every kind of command.
    #[default]
    Direct,
    /// Compute-only queue that runs concurrently with the direct queue.
    AsyncCompute,
    /// Copy-only queue.
    AsyncCopy,
}

impl QueueType {
    /// All queue types.
    pub const ALL: [QueueType; 3] = [Self::Direct, Self::AsyncCompute, Self::AsyncCopy];

    /// Dense index of the queue type.
    pub fn index(&self) -> usize {
        match self {
            Self::Direct => 0,
            Self::AsyncCompute => 1,
            Self::AsyncCopy => 2,
        }
    }
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::AsyncCompute => "async-compute",
            Self::AsyncCopy => "async-copy",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_only_satisfied_by_common() {
        assert!(ResourceStates::COMMON.satisfies(ResourceStates::COMMON));
        assert!(!ResourceStates::GENERIC_READ.satisfies(ResourceStates::COMMON));
    }

    #[test]
    fn test_generic_read_satisfies_reads() {
        assert!(ResourceStates::GENERIC_READ.satisfies(ResourceStates::PIXEL_SHADER_RESOURCE));
        assert!(ResourceStates::GENERIC_READ.satisfies(ResourceStates::ALL_SHADER_RESOURCE));
        assert!(!ResourceStates::GENERIC_READ.satisfies(ResourceStates::UNORDERED_ACCESS));
    }

    #[test]
    fn test_queue_index() {
        for (i, queue) in QueueType::ALL.iter().enumerate() {
            assert_eq!(queue.index(), i);
        }
    }
}
