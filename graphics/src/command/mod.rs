//! Command recording.
//!
//! [`CommandContext`] is the stateful recorder handed to pass callbacks. It
//! lowers calls into [`RecordedCommand`]s, which a device replays onto the
//! native API.

mod barrier;
mod context;
mod pipeline;
mod recorded;

pub use barrier::{BarrierBatch, ResourceBarrier};
pub use context::CommandContext;
pub use pipeline::{Pipeline, PipelineId, PipelineKind, ShaderParameters, ShaderSlot};
pub use recorded::{
    DrawArgs, IndexBufferView, IndexFormat, IndexedDrawArgs, OutputDesc, Predication,
    PredicationOp, RecordedCommand, TargetView, TextureView, VertexBufferView,
};
