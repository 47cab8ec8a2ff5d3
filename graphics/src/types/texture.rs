//! Texture types and descriptors.

use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit RG channels, float.
    Rg32Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// Packed 11/11/10-bit float.
    Rg11B10Float,
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24UnormStencil8,
    /// 32-bit float depth.
    Depth32Float,
    /// 32-bit float depth with 8-bit stencil.
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Whether this is a depth or depth/stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24UnormStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Whether this format carries a stencil channel.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8)
    }
}

/// Shape of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// 2D texture.
    #[default]
    D2,
    /// 3D texture; `depth_or_array_size` is the depth.
    D3,
    /// Cubemap; `depth_or_array_size` is 1.
    Cube,
    /// 2D texture array.
    D2Array,
    /// Cubemap array; `depth_or_array_size` counts cubemaps, not faces.
    CubeArray,
}

bitflags! {
    /// Creation flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        /// Sample with sRGB conversion.
        const SRGB = 1 << 0;
        /// Allocate a full mip chain.
        const MIPMAPS = 1 << 1;
        /// Allow unordered (read-write) access.
        const UNORDERED_ACCESS = 1 << 2;
    }
}

/// Sampler filter baked into the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest neighbour.
    Point,
    /// Linear within a mip level.
    #[default]
    Bilinear,
    /// Linear within and between mip levels.
    Trilinear,
}

/// Sampler address mode baked into the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Tile the texture.
    #[default]
    Repeat,
    /// Clamp to the edge texel.
    Clamp,
    /// Mirror on every tile.
    Mirror,
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Texel format.
    pub format: TextureFormat,
    /// Creation flags.
    pub flags: TextureFlags,
    /// Shape.
    pub dimension: TextureDimension,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth for 3D textures, array size for arrays, 1 otherwise.
    pub depth_or_array_size: u32,
    /// MSAA sample count.
    pub sample_count: u32,
    /// Default filter.
    pub filter: FilterMode,
    /// Default address mode.
    pub wrap: WrapMode,
    /// Mip level bias.
    pub mipmap_bias: f32,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            format: TextureFormat::default(),
            flags: TextureFlags::empty(),
            dimension: TextureDimension::D2,
            width: 1,
            height: 1,
            depth_or_array_size: 1,
            sample_count: 1,
            filter: FilterMode::default(),
            wrap: WrapMode::default(),
            mipmap_bias: 0.0,
        }
    }
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            format,
            width,
            height,
            ..Default::default()
        }
    }

    /// Create a 3D texture descriptor.
    pub fn new_3d(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            format,
            dimension: TextureDimension::D3,
            width,
            height,
            depth_or_array_size: depth,
            ..Default::default()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the creation flags.
    pub fn with_flags(mut self, flags: TextureFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the MSAA sample count.
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Whether the format is a depth/stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        self.format.is_depth_stencil()
    }

    /// Number of mip levels.
    pub fn mip_levels(&self) -> u32 {
        if self.flags.contains(TextureFlags::MIPMAPS) {
            32 - self.width.max(self.height).max(1).leading_zeros()
        } else {
            1
        }
    }

    /// Number of array slices, counting cube faces individually.
    pub fn array_slices(&self) -> u32 {
        match self.dimension {
            TextureDimension::D2 | TextureDimension::D3 => 1,
            TextureDimension::Cube => 6,
            TextureDimension::D2Array => self.depth_or_array_size,
            TextureDimension::CubeArray => self.depth_or_array_size * 6,
        }
    }

    /// Number of individually transitionable subresources.
    pub fn subresource_count(&self) -> u32 {
        self.mip_levels() * self.array_slices()
    }

    /// Flat subresource index of a mip level within an array slice.
    pub fn subresource_index(&self, mip_level: u32, array_slice: u32) -> u32 {
        mip_level + array_slice * self.mip_levels()
    }

    /// Whether an allocation made for `self` can serve a request for `other`.
    ///
    /// Everything except the label must match.
    pub fn is_compatible_with(&self, other: &TextureDescriptor) -> bool {
        self.format == other.format
            && self.flags == other.flags
            && self.dimension == other.dimension
            && self.width == other.width
            && self.height == other.height
            && self.depth_or_array_size == other.depth_or_array_size
            && self.sample_count == other.sample_count
            && self.filter == other.filter
            && self.wrap == other.wrap
            && self.mipmap_bias == other.mipmap_bias
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_formats() {
        assert!(TextureFormat::Depth32Float.is_depth_stencil());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(TextureFormat::Depth24UnormStencil8.has_stencil());
        assert!(!TextureFormat::Rgba16Float.is_depth_stencil());
    }

    #[test]
    fn test_mip_levels() {
        let desc = TextureDescriptor::new_2d(256, 128, TextureFormat::Rgba8Unorm);
        assert_eq!(desc.mip_levels(), 1);

        let desc = desc.with_flags(TextureFlags::MIPMAPS);
        assert_eq!(desc.mip_levels(), 9);
    }

    #[test]
    fn test_subresources() {
        let mut desc = TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm)
            .with_flags(TextureFlags::MIPMAPS);
        desc.dimension = TextureDimension::Cube;
        assert_eq!(desc.mip_levels(), 3);
        assert_eq!(desc.subresource_count(), 18);
        assert_eq!(desc.subresource_index(1, 2), 7);
    }

    #[test]
    fn test_compatibility_ignores_label() {
        let a = TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba16Float).with_label("A");
        let b = TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba16Float).with_label("B");
        assert!(a.is_compatible_with(&b));

        let c = TextureDescriptor::new_2d(64, 32, TextureFormat::Rgba16Float);
        assert!(!a.is_compatible_with(&c));

        let d = b.clone().with_sample_count(4);
        assert!(!a.is_compatible_with(&d));
    }
}
