//! Resources participating in one compiled graph.
//!
//! The manager owns three kinds of storage: transient allocations that live
//! for one frame, pooled allocations recycled across frames through
//! [`ReusePool`], and imported resources the caller owns. Pass-facing queries
//! take graph handles; the compiler and executor work on dense indices.

use std::sync::Arc;

use ember_core::pool::{DEFAULT_EVICTION_THRESHOLD, ReusePool};

use super::resource::{BufferHandle, ResourceHandle, TextureHandle};
use crate::resources::{Buffer, GpuResource, ResourceId, Texture};
use crate::types::{BufferDescriptor, PropertyId, TextureDescriptor};

/// Backing storage of a graph resource.
#[derive(Debug)]
enum ResourceStorage {
    /// Allocated at creation, dropped with the graph.
    TempBuffer(Arc<Buffer>),
    /// Taken from the buffer pool while alive.
    PooledBuffer {
        descriptor: BufferDescriptor,
        allocation: Option<Arc<Buffer>>,
    },
    /// Owned by the caller.
    ExternalBuffer(Arc<Buffer>),
    /// Taken from the texture pool while alive.
    PooledTexture {
        descriptor: TextureDescriptor,
        allocation: Option<Arc<Texture>>,
    },
    /// Owned by the caller.
    ExternalTexture(Arc<Texture>),
}

#[derive(Debug)]
struct ResourceEntry {
    id: PropertyId,
    storage: ResourceStorage,
    producers: Vec<usize>,
    lifetime: Option<(usize, usize)>,
}

/// Catalogue of the buffers and textures of one graph.
#[derive(Debug)]
pub struct ResourceManager {
    entries: Vec<ResourceEntry>,
    generation: u32,
    buffer_pool: ReusePool<Arc<Buffer>>,
    texture_pool: ReusePool<Arc<Texture>>,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new(DEFAULT_EVICTION_THRESHOLD)
    }
}

impl ResourceManager {
    /// Create an empty manager whose pools evict entries after
    /// `eviction_threshold` failed matches.
    pub fn new(eviction_threshold: u32) -> Self {
        Self {
            entries: Vec::new(),
            generation: 0,
            buffer_pool: ReusePool::with_eviction_threshold(eviction_threshold),
            texture_pool: ReusePool::with_eviction_threshold(eviction_threshold),
        }
    }

    /// Number of resources in the current graph.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the current graph has no resources.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generation stamped into handles issued now.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Free allocations waiting in the buffer pool.
    pub fn pooled_buffer_count(&self) -> usize {
        self.buffer_pool.free_len()
    }

    /// Free allocations waiting in the texture pool.
    pub fn pooled_texture_count(&self) -> usize {
        self.texture_pool.free_len()
    }

    // -- Creation --

    /// Declare a buffer.
    ///
    /// Sub-allocated and CPU-writable descriptors are allocated right away;
    /// everything else is taken from the pool when the buffer is born.
    pub fn create_buffer(&mut self, id: PropertyId, descriptor: BufferDescriptor) -> BufferHandle {
        let storage = if descriptor.is_sub_allocated() {
            ResourceStorage::TempBuffer(Arc::new(Buffer::new("RenderGraphTempBuffer", descriptor)))
        } else if descriptor.is_cpu_accessible() {
            log::warn!("Dynamic buffer '{id}' can not be pooled; allocating a temporary buffer");
            ResourceStorage::TempBuffer(Arc::new(Buffer::new("RenderGraphTempBuffer", descriptor)))
        } else {
            ResourceStorage::PooledBuffer {
                descriptor,
                allocation: None,
            }
        };
        BufferHandle::new(self.push(id, storage))
    }

    /// Declare a buffer and upload `bytes` into it.
    ///
    /// The content is dropped with an error if the buffer is not
    /// CPU-writable.
    pub fn create_buffer_with_content(
        &mut self,
        id: PropertyId,
        descriptor: BufferDescriptor,
        bytes: &[u8],
    ) -> BufferHandle {
        let handle = self.create_buffer(id, descriptor);
        let index = handle.handle().index() as usize;
        match &self.entries[index].storage {
            ResourceStorage::TempBuffer(buffer) if buffer.descriptor().is_cpu_accessible() => {
                if let Err(err) = buffer.set_data(bytes) {
                    log::error!("Failed to set content of buffer '{id}': {err}");
                }
            }
            _ => log::error!("Buffer '{id}' is not CPU writable; initial content dropped"),
        }
        handle
    }

    /// Declare a texture taken from the pool when it is born.
    pub fn create_texture(
        &mut self,
        id: PropertyId,
        descriptor: TextureDescriptor,
    ) -> TextureHandle {
        let storage = ResourceStorage::PooledTexture {
            descriptor,
            allocation: None,
        };
        TextureHandle::new(self.push(id, storage))
    }

    /// Import a caller-owned buffer.
    pub fn import_buffer(&mut self, id: PropertyId, buffer: Arc<Buffer>) -> BufferHandle {
        BufferHandle::new(self.push(id, ResourceStorage::ExternalBuffer(buffer)))
    }

    /// Import a caller-owned texture.
    pub fn import_texture(&mut self, id: PropertyId, texture: Arc<Texture>) -> TextureHandle {
        TextureHandle::new(self.push(id, ResourceStorage::ExternalTexture(texture)))
    }

    fn push(&mut self, id: PropertyId, storage: ResourceStorage) -> ResourceHandle {
        let index = self.entries.len() as u32;
        self.entries.push(ResourceEntry {
            id,
            storage,
            producers: Vec::new(),
            lifetime: None,
        });
        ResourceHandle::new(index, self.generation)
    }

    // -- Handle lookups --

    /// Dense index of a handle, or `None` (logged) if it is stale or out of
    /// range.
    pub fn resolve(&self, handle: impl Into<ResourceHandle>) -> Option<usize> {
        let handle = handle.into();
        if handle.generation() != self.generation {
            log::error!(
                "Stale render graph handle (generation {}, current {})",
                handle.generation(),
                self.generation
            );
            return None;
        }
        let index = handle.index() as usize;
        if index >= self.entries.len() {
            log::error!("Render graph handle {index} is out of range");
            return None;
        }
        Some(index)
    }

    /// Buffer behind `handle`, if it is currently backed by memory.
    pub fn buffer(&self, handle: BufferHandle) -> Option<Arc<Buffer>> {
        let index = self.resolve(handle)?;
        self.buffer_at(index)
    }

    /// Texture behind `handle`, if it is currently backed by memory.
    pub fn texture(&self, handle: TextureHandle) -> Option<Arc<Texture>> {
        let index = self.resolve(handle)?;
        self.texture_at(index)
    }

    /// Descriptor of the buffer behind `handle`.
    pub fn buffer_descriptor(&self, handle: BufferHandle) -> Option<BufferDescriptor> {
        let index = self.resolve(handle)?;
        match &self.entries[index].storage {
            ResourceStorage::TempBuffer(buffer) | ResourceStorage::ExternalBuffer(buffer) => {
                Some(buffer.descriptor().clone())
            }
            ResourceStorage::PooledBuffer { descriptor, .. } => Some(descriptor.clone()),
            _ => None,
        }
    }

    /// Descriptor of the texture behind `handle`.
    pub fn texture_descriptor(&self, handle: TextureHandle) -> Option<TextureDescriptor> {
        let index = self.resolve(handle)?;
        match &self.entries[index].storage {
            ResourceStorage::ExternalTexture(texture) => Some(texture.descriptor().clone()),
            ResourceStorage::PooledTexture { descriptor, .. } => Some(descriptor.clone()),
            _ => None,
        }
    }

    // -- Index queries --

    fn entry(&self, index: usize) -> Option<&ResourceEntry> {
        let entry = self.entries.get(index);
        if entry.is_none() {
            log::error!("Render graph resource {index} is out of range");
        }
        entry
    }

    fn entry_mut(&mut self, index: usize) -> Option<&mut ResourceEntry> {
        let entry = self.entries.get_mut(index);
        if entry.is_none() {
            log::error!("Render graph resource {index} is out of range");
        }
        entry
    }

    pub(crate) fn buffer_at(&self, index: usize) -> Option<Arc<Buffer>> {
        match &self.entry(index)?.storage {
            ResourceStorage::TempBuffer(buffer) | ResourceStorage::ExternalBuffer(buffer) => {
                Some(buffer.clone())
            }
            ResourceStorage::PooledBuffer { allocation, .. } => allocation.clone(),
            _ => None,
        }
    }

    pub(crate) fn texture_at(&self, index: usize) -> Option<Arc<Texture>> {
        match &self.entry(index)?.storage {
            ResourceStorage::ExternalTexture(texture) => Some(texture.clone()),
            ResourceStorage::PooledTexture { allocation, .. } => allocation.clone(),
            _ => None,
        }
    }

    /// Whether the resource at `index` is a texture.
    pub(crate) fn is_texture(&self, index: usize) -> bool {
        self.entry(index).is_some_and(|entry| {
            matches!(
                entry.storage,
                ResourceStorage::PooledTexture { .. } | ResourceStorage::ExternalTexture(_)
            )
        })
    }

    /// Property id the resource was declared under.
    pub(crate) fn property_id(&self, index: usize) -> Option<PropertyId> {
        self.entry(index).map(|entry| entry.id)
    }

    /// GPU identity of the resource, if it is backed right now.
    pub(crate) fn resource_id(&self, index: usize) -> Option<ResourceId> {
        self.buffer_at(index)
            .map(|buffer| buffer.id())
            .or_else(|| self.texture_at(index).map(|texture| texture.id()))
    }

    /// Display name used by diagnostics.
    pub(crate) fn name(&self, index: usize) -> String {
        let Some(entry) = self.entry(index) else {
            return format!("<invalid {index}>");
        };
        let label = match &entry.storage {
            ResourceStorage::TempBuffer(_) => None,
            ResourceStorage::ExternalBuffer(buffer) => Some(buffer.name().to_string()),
            ResourceStorage::ExternalTexture(texture) => Some(texture.name().to_string()),
            ResourceStorage::PooledBuffer { descriptor, .. } => descriptor.label.clone(),
            ResourceStorage::PooledTexture { descriptor, .. } => descriptor.label.clone(),
        };
        label.unwrap_or_else(|| entry.id.to_string())
    }

    /// Whether the resource outlives the graph or is visible to the CPU.
    ///
    /// Writes to external resources are side effects.
    pub(crate) fn is_external(&self, index: usize) -> bool {
        self.entry(index).is_some_and(|entry| match &entry.storage {
            ResourceStorage::TempBuffer(buffer) => buffer.descriptor().is_cpu_accessible(),
            ResourceStorage::PooledBuffer { .. } | ResourceStorage::PooledTexture { .. } => false,
            ResourceStorage::ExternalBuffer(_) | ResourceStorage::ExternalTexture(_) => true,
        })
    }

    /// Whether concurrent reads from two queues need no barrier.
    pub(crate) fn is_generically_readable(&self, index: usize) -> bool {
        self.entry(index).is_some_and(|entry| match &entry.storage {
            ResourceStorage::PooledBuffer { .. } | ResourceStorage::PooledTexture { .. } => true,
            ResourceStorage::TempBuffer(buffer) | ResourceStorage::ExternalBuffer(buffer) => {
                buffer.allows_generic_read()
            }
            ResourceStorage::ExternalTexture(texture) => texture.allows_generic_read(),
        })
    }

    /// Whether passes may write the resource.
    pub(crate) fn allow_gpu_writing(&self, index: usize) -> bool {
        self.entry(index).is_some_and(|entry| match &entry.storage {
            ResourceStorage::TempBuffer(buffer) | ResourceStorage::ExternalBuffer(buffer) => {
                !buffer.is_sub_allocated()
            }
            ResourceStorage::PooledBuffer { .. } | ResourceStorage::PooledTexture { .. } => true,
            ResourceStorage::ExternalTexture(texture) => !texture.is_read_only(),
        })
    }

    // -- Producers and lifetimes --

    /// Record that `pass` writes the resource.
    pub(crate) fn add_producer(&mut self, index: usize, pass: usize) {
        if let Some(entry) = self.entry_mut(index) {
            entry.producers.push(pass);
        }
    }

    /// Latest producer of the resource other than `pass` itself.
    pub(crate) fn last_producer_before(&self, index: usize, pass: usize) -> Option<usize> {
        self.entry(index)?
            .producers
            .iter()
            .rev()
            .copied()
            .find(|&producer| producer != pass)
    }

    /// Extend the lifetime of the resource to cover `pass`.
    pub(crate) fn set_alive(&mut self, index: usize, pass: usize) {
        if let Some(entry) = self.entry_mut(index) {
            entry.lifetime = Some(match entry.lifetime {
                Some((first, last)) => (first.min(pass), last.max(pass)),
                None => (pass, pass),
            });
        }
    }

    /// Forget every computed lifetime.
    pub(crate) fn reset_lifetimes(&mut self) {
        for entry in &mut self.entries {
            entry.lifetime = None;
        }
    }

    /// First and last pass the resource must be alive for.
    pub(crate) fn lifetime(&self, index: usize) -> Option<(usize, usize)> {
        self.entry(index)?.lifetime
    }

    // -- Allocation --

    /// Back a pooled resource with memory. Other kinds are already backed.
    pub(crate) fn request_resource(&mut self, index: usize) {
        let Some(entry) = self.entries.get_mut(index) else {
            log::error!("Render graph resource {index} is out of range");
            return;
        };
        match &mut entry.storage {
            ResourceStorage::PooledBuffer {
                descriptor,
                allocation,
            } if allocation.is_none() => {
                let buffer = self.buffer_pool.request(
                    |candidate| candidate.descriptor().is_compatible_with(descriptor),
                    |n| Arc::new(Buffer::new(format!("RenderGraphBuffer{n}"), descriptor.clone())),
                );
                log::trace!("Resource '{}' backed by {}", entry.id, buffer.name());
                *allocation = Some(buffer);
            }
            ResourceStorage::PooledTexture {
                descriptor,
                allocation,
            } if allocation.is_none() => {
                let texture = self.texture_pool.request(
                    |candidate| candidate.descriptor().is_compatible_with(descriptor),
                    |n| {
                        Arc::new(Texture::new(
                            format!("RenderGraphTexture{n}"),
                            descriptor.clone(),
                        ))
                    },
                );
                log::trace!("Resource '{}' backed by {}", entry.id, texture.name());
                *allocation = Some(texture);
            }
            _ => {}
        }
    }

    /// Return a pooled resource's memory to its pool.
    pub(crate) fn release_resource(&mut self, index: usize) {
        let Some(entry) = self.entries.get_mut(index) else {
            log::error!("Render graph resource {index} is out of range");
            return;
        };
        match &mut entry.storage {
            ResourceStorage::PooledBuffer { allocation, .. } => {
                if let Some(buffer) = allocation.take() {
                    self.buffer_pool.release(buffer);
                }
            }
            ResourceStorage::PooledTexture { allocation, .. } => {
                if let Some(texture) = allocation.take() {
                    self.texture_pool.release(texture);
                }
            }
            _ => {}
        }
    }

    /// Release every held allocation and forget all resources.
    ///
    /// Handles issued before the call become stale.
    pub fn clear(&mut self) {
        for index in 0..self.entries.len() {
            self.release_resource(index);
        }
        self.entries.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferFlags, BufferUsage, TextureFormat};

    fn gpu_buffer() -> BufferDescriptor {
        BufferDescriptor::new(16, 64, BufferUsage::STRUCTURED)
    }

    #[test]
    fn test_storage_selection() {
        let mut manager = ResourceManager::default();
        let transient = manager.create_buffer(
            PropertyId(1),
            BufferDescriptor::new(16, 4, BufferUsage::CONSTANT).with_flags(BufferFlags::TRANSIENT),
        );
        let dynamic = manager.create_buffer(
            PropertyId(2),
            BufferDescriptor::new(16, 4, BufferUsage::VERTEX).with_flags(BufferFlags::DYNAMIC),
        );
        let pooled = manager.create_buffer(PropertyId(3), gpu_buffer());

        assert!(manager.buffer(transient).is_some());
        assert!(manager.buffer(dynamic).is_some());
        assert!(manager.buffer(pooled).is_none());

        let pooled = manager.resolve(pooled).unwrap();
        assert!(!manager.is_external(pooled));
        assert!(manager.is_external(manager.resolve(dynamic).unwrap()));
        assert!(!manager.allow_gpu_writing(manager.resolve(transient).unwrap()));
        assert!(manager.allow_gpu_writing(pooled));
    }

    #[test]
    fn test_content_requires_cpu_access() {
        let mut manager = ResourceManager::default();
        let upload = manager.create_buffer_with_content(
            PropertyId(1),
            BufferDescriptor::new(4, 2, BufferUsage::CONSTANT).with_flags(BufferFlags::DYNAMIC),
            &[1, 2, 3, 4, 5, 6, 7, 8],
        );
        assert_eq!(manager.buffer(upload).unwrap().data(), vec![1, 2, 3, 4, 5, 6, 7, 8]);

        let gpu_only = manager.create_buffer_with_content(PropertyId(2), gpu_buffer(), &[1]);
        assert!(manager.buffer(gpu_only).is_none());
    }

    #[test]
    fn test_pooled_allocations_are_reused() {
        let mut manager = ResourceManager::default();
        let handle = manager.create_texture(
            PropertyId(1),
            TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba16Float),
        );
        let index = manager.resolve(handle).unwrap();
        manager.request_resource(index);
        let first = manager.texture(handle).unwrap();
        assert_eq!(first.name(), "RenderGraphTexture1");
        manager.release_resource(index);
        assert!(manager.texture(handle).is_none());
        assert_eq!(manager.pooled_texture_count(), 1);

        manager.clear();
        let handle = manager.create_texture(
            PropertyId(2),
            TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba16Float),
        );
        let index = manager.resolve(handle).unwrap();
        manager.request_resource(index);
        assert!(Arc::ptr_eq(&first, &manager.texture(handle).unwrap()));
    }

    #[test]
    fn test_clear_returns_held_allocations() {
        let mut manager = ResourceManager::default();
        let handle = manager.create_buffer(PropertyId(1), gpu_buffer());
        let index = manager.resolve(handle).unwrap();
        manager.request_resource(index);
        manager.clear();
        assert_eq!(manager.pooled_buffer_count(), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut manager = ResourceManager::default();
        let handle = manager.create_buffer(PropertyId(1), gpu_buffer());
        manager.clear();
        let _ = manager.create_buffer(PropertyId(1), gpu_buffer());
        assert_eq!(manager.resolve(handle), None);
        assert!(manager.buffer_descriptor(handle).is_none());
    }

    #[test]
    fn test_producers_and_lifetime() {
        let mut manager = ResourceManager::default();
        let handle = manager.create_buffer(PropertyId(1), gpu_buffer());
        let index = manager.resolve(handle).unwrap();

        manager.add_producer(index, 1);
        manager.add_producer(index, 4);
        assert_eq!(manager.last_producer_before(index, 6), Some(4));
        assert_eq!(manager.last_producer_before(index, 4), Some(1));
        assert_eq!(manager.last_producer_before(index, 1), Some(4));

        assert_eq!(manager.lifetime(index), None);
        manager.set_alive(index, 3);
        manager.set_alive(index, 1);
        manager.set_alive(index, 5);
        assert_eq!(manager.lifetime(index), Some((1, 5)));
    }

    #[test]
    fn test_imported_resources() {
        let mut manager = ResourceManager::default();
        let texture = Arc::new(Texture::new_read_only(
            "Lut",
            TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm),
        ));
        let handle = manager.import_texture(PropertyId(9), texture.clone());
        let index = manager.resolve(handle).unwrap();

        assert!(manager.is_external(index));
        assert!(!manager.allow_gpu_writing(index));
        assert!(manager.is_texture(index));
        assert_eq!(manager.name(index), "Lut");
        assert_eq!(manager.resource_id(index), Some(texture.id()));
    }
}
