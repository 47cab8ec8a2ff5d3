//! Resource handles for the render graph.

use bitflags::bitflags;

use crate::types::CubeFace;

/// Generic handle to a resource in the render graph.
///
/// Handles carry the generation of the graph that issued them, so a handle
/// kept from an earlier frame is rejected instead of aliasing a new resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    /// Index into the resource array.
    index: u32,
    /// Generation counter for validation.
    generation: u32,
}

impl ResourceHandle {
    /// Create a new resource handle.
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get the index of this resource.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get the generation of this handle.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Handle to a buffer in the render graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(ResourceHandle);

impl BufferHandle {
    pub(crate) fn new(handle: ResourceHandle) -> Self {
        Self(handle)
    }

    /// Untyped handle.
    pub fn handle(&self) -> ResourceHandle {
        self.0
    }
}

/// Handle to a texture in the render graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(ResourceHandle);

impl TextureHandle {
    pub(crate) fn new(handle: ResourceHandle) -> Self {
        Self(handle)
    }

    /// Untyped handle.
    pub fn handle(&self) -> ResourceHandle {
        self.0
    }
}

impl From<BufferHandle> for ResourceHandle {
    fn from(handle: BufferHandle) -> Self {
        handle.0
    }
}

impl From<TextureHandle> for ResourceHandle {
    fn from(handle: TextureHandle) -> Self {
        handle.0
    }
}

/// One mip level of one array slice of a graph texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSlice {
    texture: TextureHandle,
    mip_level: u32,
    array_slice: u32,
}

impl TextureSlice {
    /// Mip 0 of slice 0.
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture,
            mip_level: 0,
            array_slice: 0,
        }
    }

    /// Select a mip level.
    pub fn with_mip_level(mut self, mip_level: u32) -> Self {
        self.mip_level = mip_level;
        self
    }

    /// Select an array slice.
    pub fn with_array_slice(mut self, array_slice: u32) -> Self {
        self.array_slice = array_slice;
        self
    }

    /// Select a cubemap face.
    pub fn with_face(self, face: CubeFace) -> Self {
        self.with_array_slice(face as u32)
    }

    /// Texture the slice belongs to.
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    /// Selected mip level.
    pub fn mip_level(&self) -> u32 {
        self.mip_level
    }

    /// Selected array slice.
    pub fn array_slice(&self) -> u32 {
        self.array_slice
    }
}

impl From<TextureHandle> for TextureSlice {
    fn from(texture: TextureHandle) -> Self {
        Self::new(texture)
    }
}

bitflags! {
    /// How a pass uses a declared resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PassResourceUsage: u8 {
        /// Bound as a color or depth/stencil target.
        const RENDER_TARGET = 1 << 0;
        /// Bound as a global shader variable under its property id.
        const VARIABLE = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_conversion() {
        let raw = ResourceHandle::new(3, 7);
        let texture = TextureHandle::new(raw);
        let handle: ResourceHandle = texture.into();
        assert_eq!(handle.index(), 3);
        assert_eq!(handle.generation(), 7);
    }

    #[test]
    fn test_slice_face() {
        let texture = TextureHandle::new(ResourceHandle::new(0, 0));
        let slice = TextureSlice::from(texture)
            .with_face(CubeFace::NegativeY)
            .with_mip_level(2);
        assert_eq!(slice.array_slice(), 3);
        assert_eq!(slice.mip_level(), 2);
        assert_eq!(slice.texture(), texture);
    }
}
