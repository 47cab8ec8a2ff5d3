//! GPU buffer resource.

use parking_lot::{Mutex, MutexGuard};

use super::{GpuResource, ResourceId, StateTracker};
use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, ResourceStates};

/// A GPU buffer resource.
///
/// Buffers are shared as `Arc<Buffer>`. CPU-writable buffers (dynamic or
/// sub-allocated) live in upload memory, so their state is locked to
/// [`ResourceStates::GENERIC_READ`] for their whole life.
///
/// # Example
///
/// ```
/// use ember_graphics::{Buffer, BufferDescriptor, BufferFlags, BufferUsage};
///
/// let desc = BufferDescriptor::new(16, 4, BufferUsage::CONSTANT).with_flags(BufferFlags::DYNAMIC);
/// let buffer = Buffer::new("Constants", desc);
/// buffer.set_data(&[0u8; 64]).unwrap();
/// assert_eq!(buffer.size(), 64);
/// ```
pub struct Buffer {
    id: ResourceId,
    name: String,
    descriptor: BufferDescriptor,
    state: Mutex<StateTracker>,
    data: Mutex<Vec<u8>>,
}

impl Buffer {
    /// Create a new buffer.
    pub fn new(name: impl Into<String>, descriptor: BufferDescriptor) -> Self {
        let state = if descriptor.is_cpu_accessible() {
            StateTracker::locked(ResourceStates::GENERIC_READ, 1)
        } else {
            StateTracker::new(ResourceStates::COMMON, 1)
        };

        Self {
            id: ResourceId::next(),
            name: name.into(),
            descriptor,
            state: Mutex::new(state),
            data: Mutex::new(Vec::new()),
        }
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size()
    }

    /// Whether the buffer is carved out of a shared page.
    pub fn is_sub_allocated(&self) -> bool {
        self.descriptor.is_sub_allocated()
    }

    /// Whether the buffer can be read from any queue without a barrier.
    ///
    /// True when it already holds every read state, or when nothing prevents
    /// moving it there.
    pub fn allows_generic_read(&self) -> bool {
        let state = self.state.lock();
        state.has_all_states(ResourceStates::GENERIC_READ) || !state.is_locked()
    }

    /// Upload CPU data into the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the buffer is not
    /// CPU-writable or the data does not fit.
    pub fn set_data(&self, bytes: &[u8]) -> Result<(), GraphicsError> {
        if !self.descriptor.is_cpu_accessible() {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer '{}' is not CPU accessible",
                self.name
            )));
        }

        if bytes.len() as u64 > self.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} bytes do not fit in buffer '{}' of size {}",
                bytes.len(),
                self.name,
                self.size()
            )));
        }

        let mut data = self.data.lock();
        data.clear();
        data.extend_from_slice(bytes);
        Ok(())
    }

    /// Copy of the last uploaded CPU data.
    pub fn data(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl GpuResource for Buffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> MutexGuard<'_, StateTracker> {
        self.state.lock()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.name)
            .field("size", &self.size())
            .field("usage", &self.descriptor.usage)
            .field("flags", &self.descriptor.flags)
            .finish()
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferFlags, BufferUsage};

    #[test]
    fn test_buffer_debug() {
        let buffer = Buffer::new("Lights", BufferDescriptor::new(16, 64, BufferUsage::STRUCTURED));
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("Lights"));
        assert!(debug.contains("1024"));
    }

    #[test]
    fn test_gpu_buffer_starts_common_and_unlocked() {
        let buffer = Buffer::new("Gpu", BufferDescriptor::new(4, 4, BufferUsage::RW_STRUCTURED));
        assert_eq!(buffer.state().uniform_state(), Some(ResourceStates::COMMON));
        assert!(!buffer.state().is_locked());
        assert!(buffer.allows_generic_read());
    }

    #[test]
    fn test_dynamic_buffer_is_locked_generic_read() {
        let desc = BufferDescriptor::new(4, 4, BufferUsage::CONSTANT).with_flags(BufferFlags::DYNAMIC);
        let buffer = Buffer::new("Dynamic", desc);
        assert!(buffer.state().is_locked());
        assert!(buffer.allows_generic_read());
    }

    #[test]
    fn test_set_data_requires_cpu_access() {
        let buffer = Buffer::new("Gpu", BufferDescriptor::new(4, 4, BufferUsage::STRUCTURED));
        assert!(buffer.set_data(&[1, 2, 3]).is_err());

        let desc = BufferDescriptor::new(4, 1, BufferUsage::CONSTANT).with_flags(BufferFlags::DYNAMIC);
        let buffer = Buffer::new("Dynamic", desc);
        assert!(buffer.set_data(&[1, 2, 3, 4, 5]).is_err());
        buffer.set_data(&[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.data(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Buffer::new("A", BufferDescriptor::default());
        let b = Buffer::new("B", BufferDescriptor::default());
        assert_ne!(a.id(), b.id());
    }
}
