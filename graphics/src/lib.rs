//! # Ember Graphics
//!
//! Frame render graph and command recording for the Ember renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderGraph`] - Per-frame pass declarations, culling, resource
//!   lifetimes and async compute scheduling
//! - [`CommandContext`] - Stateful command recorder with automatic resource
//!   barriers and redundant state elimination
//! - [`GfxDevice`] - The four device primitives the graph needs, with a
//!   recording [`DummyDevice`] for tests
//!
//! ## Example
//!
//! ```
//! use ember_graphics::{
//!     BufferDescriptor, BufferUsage, DummyDevice, PropertyId, QueueType, RenderGraph,
//! };
//!
//! let device = DummyDevice::new();
//! let mut graph = RenderGraph::default();
//!
//! let particles = graph.create_buffer(
//!     PropertyId(1),
//!     BufferDescriptor::new(16, 1024, BufferUsage::RW_STRUCTURED),
//! );
//! graph.add_pass("Simulate").write(particles);
//! graph
//!     .add_pass("Draw")
//!     .read(particles)
//!     .allow_culling(false)
//!     .set_render_func(move |ctx| {
//!         assert!(ctx.buffer(particles).is_some());
//!         Ok(())
//!     });
//!
//! graph.compile_and_execute(&device).unwrap();
//! assert_eq!(device.submissions(QueueType::Direct).len(), 1);
//! ```

pub mod command;
mod compiler;
pub mod device;
pub mod error;
mod executor;
pub mod graph;
pub mod resources;
pub mod types;

pub use command::{
    CommandContext, DrawArgs, IndexBufferView, IndexFormat, IndexedDrawArgs, OutputDesc,
    Pipeline, PipelineId, PipelineKind, Predication, PredicationOp, RecordedCommand,
    ResourceBarrier, ShaderParameters, ShaderSlot, TargetView, TextureView, VertexBufferView,
};
#[cfg(feature = "dummy")]
pub use device::{DeviceEvent, DummyDevice};
pub use device::{CommandManager, CommandQueue, Fence, GfxDevice, Submission, SyncPoint};
pub use error::GraphicsError;
pub use graph::{
    BufferHandle, ColorTargetInit, CompiledGraphView, CompiledPassView, DepthStencilInit,
    GraphListener, GraphSettings, MAX_COLOR_TARGETS, PassBuilder, PassContext,
    PassResourceUsage, RenderFunc, RenderGraph, ResourceHandle, ResourceManager, TextureHandle,
    TextureSlice,
};
pub use resources::{Buffer, GpuResource, ResourceId, StateTracker, Texture};
pub use types::{
    BufferDescriptor, BufferFlags, BufferUsage, CLEAR_BLACK, ClearColor, CubeFace, DepthBias,
    FilterMode, PrimitiveTopology, PropertyId, QueueType, ResourceStates, ScissorRect,
    TextureDescriptor, TextureDimension, TextureFlags, TextureFormat, Viewport, WrapMode,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
