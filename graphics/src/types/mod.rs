//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, resource states and the
//! descriptor structs used throughout the graphics system.

mod buffer;
mod common;
mod state;
mod texture;

pub use buffer::{BufferDescriptor, BufferFlags, BufferUsage};
pub use common::{
    CLEAR_BLACK, ClearColor, CubeFace, DepthBias, PrimitiveTopology, PropertyId, ScissorRect,
    Viewport,
};
pub use state::{QueueType, ResourceStates};
pub use texture::{
    FilterMode, TextureDescriptor, TextureDimension, TextureFlags, TextureFormat, WrapMode,
};
