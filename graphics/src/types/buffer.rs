//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a constant buffer.
        const CONSTANT = 1 << 2;
        /// Buffer can be copied from and to.
        const COPY = 1 << 3;
        /// Read-only structured buffer.
        const STRUCTURED = 1 << 4;
        /// Read-only byte address buffer.
        const BYTE_ADDRESS = 1 << 5;
        /// Read-write structured buffer.
        const RW_STRUCTURED = 1 << 6;
        /// Read-write structured buffer with a hidden counter.
        const RW_STRUCTURED_WITH_COUNTER = 1 << 7;
        /// Read-write byte address buffer.
        const RW_BYTE_ADDRESS = 1 << 8;
        /// Buffer can hold indirect draw/dispatch arguments.
        const INDIRECT = 1 << 9;
    }
}

impl BufferUsage {
    /// Usages that need unordered (read-write) access on the GPU.
    pub const UNORDERED_ACCESS: Self = Self::RW_STRUCTURED
        .union(Self::RW_STRUCTURED_WITH_COUNTER)
        .union(Self::RW_BYTE_ADDRESS);
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Allocation flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// Lives in CPU-writable memory. Its state is locked to `GENERIC_READ`.
        const DYNAMIC = 1 << 0;
        /// Sub-allocated from a shared page, valid for one frame only.
        ///
        /// Ignored when the buffer needs unordered access.
        const TRANSIENT = 1 << 1;
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size of one element in bytes.
    pub stride: u32,
    /// Number of elements.
    pub count: u32,
    /// Usage flags.
    pub usage: BufferUsage,
    /// Allocation flags.
    pub flags: BufferFlags,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(stride: u32, count: u32, usage: BufferUsage) -> Self {
        Self {
            label: None,
            stride,
            count,
            usage,
            flags: BufferFlags::empty(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the allocation flags.
    pub fn with_flags(mut self, flags: BufferFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.stride as u64 * self.count as u64
    }

    /// Whether the buffer needs unordered access.
    pub fn allows_unordered_access(&self) -> bool {
        self.usage.intersects(BufferUsage::UNORDERED_ACCESS)
    }

    /// Whether the backing memory is CPU-writable.
    pub fn is_cpu_accessible(&self) -> bool {
        self.flags.contains(BufferFlags::DYNAMIC) || self.is_sub_allocated()
    }

    /// Whether the buffer is carved out of a shared page.
    ///
    /// Barriers on a sub-allocated buffer would change the state of the whole
    /// page, so such buffers are never written by the GPU.
    pub fn is_sub_allocated(&self) -> bool {
        self.flags.contains(BufferFlags::TRANSIENT) && !self.allows_unordered_access()
    }

    /// Whether an allocation made for `self` can serve a request for `other`.
    ///
    /// Strides and flags must match, the element count may be larger, and the
    /// usages must be a superset. Labels are ignored.
    pub fn is_compatible_with(&self, other: &BufferDescriptor) -> bool {
        self.stride == other.stride
            && self.count >= other.count
            && self.usage.contains(other.usage)
            && self.flags == other.flags
    }
}
