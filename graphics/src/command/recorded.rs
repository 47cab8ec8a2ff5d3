//! Native command vocabulary.
//!
//! A [`CommandContext`](super::CommandContext) lowers its calls into this list;
//! a device backend replays it onto the real API. The dummy device keeps the
//! list around so tests can inspect exactly what would reach the driver.

use std::sync::Arc;

use super::barrier::ResourceBarrier;
use super::pipeline::PipelineId;
use crate::resources::{Buffer, GpuResource, ResourceId, Texture};
use crate::types::{
    ClearColor, DepthBias, PrimitiveTopology, PropertyId, ScissorRect, TextureFormat, Viewport,
};

/// A texture subresource used as a render target or clear target.
#[derive(Debug, Clone)]
pub struct TextureView {
    texture: Arc<Texture>,
    mip_level: u32,
    array_slice: u32,
}

impl TextureView {
    /// View of mip 0, slice 0.
    pub fn new(texture: Arc<Texture>) -> Self {
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

    /// Select an array slice (or cube face, or depth slice).
    pub fn with_array_slice(mut self, array_slice: u32) -> Self {
        self.array_slice = array_slice;
        self
    }

    /// Viewed texture.
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    /// Flat subresource index of the view.
    pub fn subresource(&self) -> u32 {
        self.texture
            .descriptor()
            .subresource_index(self.mip_level, self.array_slice)
    }

    /// Width of the viewed mip level.
    pub fn width(&self) -> u32 {
        (self.texture.width() >> self.mip_level).max(1)
    }

    /// Height of the viewed mip level.
    pub fn height(&self) -> u32 {
        (self.texture.height() >> self.mip_level).max(1)
    }

    /// Lowered form recorded into command lists.
    pub fn target(&self) -> TargetView {
        TargetView {
            resource: self.texture.id(),
            mip_level: self.mip_level,
            array_slice: self.array_slice,
        }
    }
}

/// Recorded identity of a texture subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetView {
    /// Viewed resource.
    pub resource: ResourceId,
    /// Mip level.
    pub mip_level: u32,
    /// Array slice.
    pub array_slice: u32,
}

/// Vertex buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferView {
    /// Bound buffer.
    pub buffer: ResourceId,
    /// Size in bytes.
    pub size: u64,
    /// Vertex stride in bytes.
    pub stride: u32,
}

impl VertexBufferView {
    /// View of a whole buffer using its element stride.
    pub fn of(buffer: &Buffer) -> Self {
        Self {
            buffer: buffer.id(),
            size: buffer.size(),
            stride: buffer.descriptor().stride,
        }
    }
}

/// Index element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices.
    U16,
    /// 32-bit indices.
    U32,
}

/// Index buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBufferView {
    /// Bound buffer.
    pub buffer: ResourceId,
    /// Size in bytes.
    pub size: u64,
    /// Index width.
    pub format: IndexFormat,
}

impl IndexBufferView {
    /// View of a whole buffer, picking the index width from its stride.
    pub fn of(buffer: &Buffer) -> Self {
        let format = if buffer.descriptor().stride == 2 {
            IndexFormat::U16
        } else {
            IndexFormat::U32
        };
        Self {
            buffer: buffer.id(),
            size: buffer.size(),
            format,
        }
    }
}

/// Condition under which predicated work is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicationOp {
    /// Skip when the predicate value is zero.
    EqualZero,
    /// Skip when the predicate value is not zero.
    NotEqualZero,
}

/// Active predication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predication {
    /// Buffer holding the predicate.
    pub buffer: ResourceId,
    /// Byte offset of the predicate.
    pub offset: u64,
    /// Skip condition.
    pub op: PredicationOp,
}

/// Render-target side of a graphics pipeline, derived from the bound targets
/// and rasterizer overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDesc {
    /// Formats of the bound color targets.
    pub color_formats: Vec<TextureFormat>,
    /// Format of the bound depth target.
    pub depth_format: Option<TextureFormat>,
    /// MSAA sample count.
    pub sample_count: u32,
    /// Depth bias.
    pub depth_bias: DepthBias,
    /// Wireframe rasterization.
    pub wireframe: bool,
}

impl Default for OutputDesc {
    fn default() -> Self {
        Self {
            color_formats: Vec::new(),
            depth_format: None,
            sample_count: 1,
            depth_bias: DepthBias::default(),
            wireframe: false,
        }
    }
}

/// Draw arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawArgs {
    /// Vertices per instance.
    pub vertex_count: u32,
    /// Number of instances.
    pub instance_count: u32,
    /// First vertex.
    pub start_vertex: u32,
    /// First instance.
    pub start_instance: u32,
}

impl DrawArgs {
    /// Draw `vertex_count` vertices once.
    pub fn vertices(vertex_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count: 1,
            start_vertex: 0,
            start_instance: 0,
        }
    }
}

/// Indexed draw arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexedDrawArgs {
    /// Indices per instance.
    pub index_count: u32,
    /// Number of instances.
    pub instance_count: u32,
    /// First index.
    pub start_index: u32,
    /// Value added to each index.
    pub base_vertex: i32,
    /// First instance.
    pub start_instance: u32,
}

impl IndexedDrawArgs {
    /// Draw `index_count` indices once.
    pub fn indices(index_count: u32) -> Self {
        Self {
            index_count,
            instance_count: 1,
            start_index: 0,
            base_vertex: 0,
            start_instance: 0,
        }
    }
}

/// One native call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// Batched state transitions.
    ResourceBarriers(Vec<ResourceBarrier>),
    /// Bind a graphics pipeline variant for the given output description.
    SetGraphicsPipeline {
        /// Pipeline identity.
        pipeline: PipelineId,
        /// Output description the variant was built for.
        output: OutputDesc,
    },
    /// Bind a compute pipeline.
    SetComputePipeline(PipelineId),
    /// Set the primitive topology.
    SetPrimitiveTopology(PrimitiveTopology),
    /// Bind a vertex buffer.
    SetVertexBuffer(VertexBufferView),
    /// Bind an index buffer.
    SetIndexBuffer(IndexBufferView),
    /// Bind render targets.
    SetRenderTargets {
        /// Color targets in slot order.
        colors: Vec<TargetView>,
        /// Depth/stencil target.
        depth: Option<TargetView>,
    },
    /// Set viewports.
    SetViewports(Vec<Viewport>),
    /// Set scissor rectangles.
    SetScissorRects(Vec<ScissorRect>),
    /// Enable or disable predication.
    SetPredication(Option<Predication>),
    /// Set the stencil reference value.
    SetStencilRef(u8),
    /// Bind a resource to a shader slot.
    BindResource {
        /// Property the slot reads.
        slot: PropertyId,
        /// Register index.
        register: u32,
        /// Bound resource.
        resource: ResourceId,
        /// Read-write binding.
        writable: bool,
    },
    /// Clear a color target.
    ClearColor {
        /// Cleared target.
        target: TargetView,
        /// Clear value.
        color: ClearColor,
    },
    /// Clear a depth/stencil target.
    ClearDepthStencil {
        /// Cleared target.
        target: TargetView,
        /// Depth clear value.
        depth: f32,
        /// Stencil clear value.
        stencil: u8,
    },
    /// Discard the contents of a target.
    Discard(TargetView),
    /// Non-indexed draw.
    Draw(DrawArgs),
    /// Indexed draw.
    DrawIndexed(IndexedDrawArgs),
    /// Compute dispatch.
    Dispatch {
        /// Thread groups in X.
        x: u32,
        /// Thread groups in Y.
        y: u32,
        /// Thread groups in Z.
        z: u32,
    },
    /// Copy a whole buffer.
    CopyBuffer {
        /// Source buffer.
        src: ResourceId,
        /// Destination buffer.
        dst: ResourceId,
        /// Bytes copied.
        size: u64,
    },
    /// Copy a whole texture.
    CopyTexture {
        /// Source texture.
        src: ResourceId,
        /// Destination texture.
        dst: ResourceId,
    },
    /// Open a named debug marker region.
    BeginEvent(String),
    /// Close the innermost debug marker region.
    EndEvent,
}

impl RecordedCommand {
    /// Whether this command changes bound state rather than doing work.
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            Self::SetGraphicsPipeline { .. }
                | Self::SetComputePipeline(_)
                | Self::SetPrimitiveTopology(_)
                | Self::SetVertexBuffer(_)
                | Self::SetIndexBuffer(_)
                | Self::SetRenderTargets { .. }
                | Self::SetViewports(_)
                | Self::SetScissorRects(_)
                | Self::SetPredication(_)
                | Self::SetStencilRef(_)
                | Self::BindResource { .. }
        )
    }
}
