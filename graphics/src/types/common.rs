//! Common types used across the graphics API.

// ============================================================================
// Viewport
// ============================================================================

/// Viewport for rasterization.
///
/// Uses the `[0, 1]` depth range by convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X coordinate of the viewport's top-left corner.
    pub x: f32,
    /// Y coordinate of the viewport's top-left corner.
    pub y: f32,
    /// Width of the viewport.
    pub width: f32,
    /// Height of the viewport.
    pub height: f32,
    /// Minimum depth value (default: 0.0).
    pub min_depth: f32,
    /// Maximum depth value (default: 1.0).
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl Viewport {
    /// Create a new viewport with standard `[0, 1]` depth range.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Create a viewport from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Set the depth range.
    ///
    /// `min > max` is valid and is how reverse-Z is expressed.
    pub fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }
}

// ============================================================================
// Scissor Rectangle
// ============================================================================

/// Scissor rectangle for clipping rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    /// X coordinate of the top-left corner.
    pub x: i32,
    /// Y coordinate of the top-left corner.
    pub y: i32,
    /// Width of the scissor rectangle.
    pub width: u32,
    /// Height of the scissor rectangle.
    pub height: u32,
}

impl ScissorRect {
    /// Create a new scissor rectangle.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a scissor rectangle from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

// ============================================================================
// Rasterizer state
// ============================================================================

/// Depth bias applied by the rasterizer.
///
/// The default matches the hardware defaults: no bias at all.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant bias added to each fragment's depth.
    pub bias: i32,
    /// Bias scaled by the fragment's depth slope.
    pub slope_scaled: f32,
    /// Maximum absolute bias.
    pub clamp: f32,
}

impl DepthBias {
    /// Create a depth bias.
    pub fn new(bias: i32, slope_scaled: f32, clamp: f32) -> Self {
        Self {
            bias,
            slope_scaled,
            clamp,
        }
    }
}

/// Primitive topology used by draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// List of points.
    PointList,
    /// List of lines.
    LineList,
    /// Strip of lines.
    LineStrip,
    /// List of triangles.
    #[default]
    TriangleList,
    /// Strip of triangles.
    TriangleStrip,
}

/// Face of a cubemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CubeFace {
    /// +X
    #[default]
    PositiveX = 0,
    /// -X
    NegativeX = 1,
    /// +Y
    PositiveY = 2,
    /// -Y
    NegativeY = 3,
    /// +Z
    PositiveZ = 4,
    /// -Z
    NegativeZ = 5,
}

/// RGBA clear color.
pub type ClearColor = [f32; 4];

/// Opaque black.
pub const CLEAR_BLACK: ClearColor = [0.0, 0.0, 0.0, 1.0];

/// Identifier of a shader property, interned upstream from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub i32);

impl PropertyId {
    /// The per-draw instance data buffer.
    pub const INSTANCE_BUFFER: Self = Self(-1);
    /// The material constant buffer.
    pub const MATERIAL_CONSTANTS: Self = Self(-2);

    /// Shader-side name of a built-in alias, if this is one.
    pub fn builtin_name(&self) -> Option<&'static str> {
        match *self {
            Self::INSTANCE_BUFFER => Some("_InstanceBuffer"),
            Self::MATERIAL_CONSTANTS => Some("_MaterialConstants"),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.builtin_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "#{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_from_dimensions() {
        let vp = Viewport::from_dimensions(1920, 1080);
        assert_eq!(vp.width, 1920.0);
        assert_eq!(vp.height, 1080.0);
        assert_eq!(vp.max_depth, 1.0);
    }

    #[test]
    fn test_depth_bias_default_is_zero() {
        assert_eq!(DepthBias::default(), DepthBias::new(0, 0.0, 0.0));
    }

    #[test]
    fn test_property_id_display() {
        assert_eq!(PropertyId::INSTANCE_BUFFER.to_string(), "_InstanceBuffer");
        assert_eq!(PropertyId(7).to_string(), "#7");
    }
}
