//! GPU texture resource.

use parking_lot::{Mutex, MutexGuard};

use super::{GpuResource, ResourceId, StateTracker};
use crate::types::{ResourceStates, TextureDescriptor, TextureFormat};

/// A GPU texture resource.
///
/// Textures are shared as `Arc<Texture>`. Each mip level of each array slice
/// is a subresource with its own tracked state.
pub struct Texture {
    id: ResourceId,
    name: String,
    descriptor: TextureDescriptor,
    read_only: bool,
    state: Mutex<StateTracker>,
}

impl Texture {
    /// Create a texture the GPU may write to.
    pub fn new(name: impl Into<String>, descriptor: TextureDescriptor) -> Self {
        Self::with_access(name.into(), descriptor, false)
    }

    /// Create a texture that only shaders read, such as a loaded asset.
    pub fn new_read_only(name: impl Into<String>, descriptor: TextureDescriptor) -> Self {
        Self::with_access(name.into(), descriptor, true)
    }

    fn with_access(name: String, descriptor: TextureDescriptor, read_only: bool) -> Self {
        let initial = if read_only {
            ResourceStates::ALL_SHADER_RESOURCE
        } else {
            ResourceStates::COMMON
        };
        let state = StateTracker::new(initial, descriptor.subresource_count());

        Self {
            id: ResourceId::next(),
            name,
            descriptor,
            read_only,
            state: Mutex::new(state),
        }
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the texture width.
    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    /// Get the texture height.
    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the sample count.
    pub fn sample_count(&self) -> u32 {
        self.descriptor.sample_count
    }

    /// Whether the GPU must not write to this texture.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the texture can be read from any queue without a barrier.
    pub fn allows_generic_read(&self) -> bool {
        let state = self.state.lock();
        state.has_all_states(ResourceStates::GENERIC_READ) || !state.is_locked()
    }
}

impl GpuResource for Texture {
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

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("name", &self.name)
            .field("width", &self.descriptor.width)
            .field("height", &self.descriptor.height)
            .field("format", &self.descriptor.format)
            .field("read_only", &self.read_only)
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureFlags;

    #[test]
    fn test_texture_accessors() {
        let texture = Texture::new(
            "Scene",
            TextureDescriptor::new_2d(1280, 720, TextureFormat::Rgba16Float),
        );
        assert_eq!(texture.width(), 1280);
        assert_eq!(texture.height(), 720);
        assert_eq!(texture.format(), TextureFormat::Rgba16Float);
        assert!(!texture.is_read_only());
        assert_eq!(texture.name(), "Scene");
    }

    #[test]
    fn test_state_tracks_all_subresources() {
        let desc = TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm)
            .with_flags(TextureFlags::MIPMAPS);
        let texture = Texture::new("Mips", desc);
        assert_eq!(texture.state().subresource_count(), 4);
    }

    #[test]
    fn test_read_only_texture_starts_readable() {
        let texture = Texture::new_read_only(
            "Albedo",
            TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm),
        );
        assert!(texture.is_read_only());
        assert!(texture.state().has_all_states(ResourceStates::PIXEL_SHADER_RESOURCE));
    }
}
