//! Render graph infrastructure.
//!
//! The render graph describes one frame as an ordered list of passes, each
//! declaring the resources it reads and writes. Compiling the graph:
//!
//! - Culls passes whose results nobody consumes
//! - Computes when each transient resource is allocated and released
//! - Moves eligible compute passes to the async compute queue and decides
//!   where the direct queue has to wait for them
//!
//! Execution then records every surviving pass through the device's command
//! contexts and submits them.
//!
//! # Example
//!
//! ```
//! use ember_graphics::{
//!     CLEAR_BLACK, ColorTargetInit, DummyDevice, GraphSettings, PropertyId, RenderGraph,
//!     TextureDescriptor, TextureFormat,
//! };
//!
//! let device = DummyDevice::new();
//! let mut graph = RenderGraph::new(GraphSettings::default());
//!
//! let color = graph.create_texture(
//!     PropertyId(1),
//!     TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8Unorm),
//! );
//! graph
//!     .add_pass("Clear")
//!     .set_color_target(color, 0, ColorTargetInit::Clear(CLEAR_BLACK))
//!     .allow_culling(false);
//!
//! graph.compile_and_execute(&device).unwrap();
//! ```

mod builder;
mod context;
mod listener;
mod pass;
mod resource;
mod resource_manager;
mod settings;

use std::sync::Arc;

use ember_core::frame_mark;

use crate::compiler::{self, CompiledSchedule};
use crate::device::GfxDevice;
use crate::error::GraphicsError;
use crate::executor;
use crate::resources::{Buffer, Texture};
use crate::types::{BufferDescriptor, PropertyId, TextureDescriptor};

pub use builder::PassBuilder;
pub use context::PassContext;
pub use listener::{CompiledGraphView, CompiledPassView, GraphListener};
pub(crate) use pass::Pass;
pub use pass::{ColorTargetInit, DepthStencilInit, MAX_COLOR_TARGETS, RenderFunc};
pub use resource::{BufferHandle, PassResourceUsage, ResourceHandle, TextureHandle, TextureSlice};
pub use resource_manager::ResourceManager;
pub use settings::GraphSettings;

/// One frame's worth of passes and the resources they use.
///
/// A graph is filled, compiled and executed once per frame. Executing clears
/// the passes and declared resources; pooled allocations stay in the
/// [`ResourceManager`] for the next frame.
pub struct RenderGraph {
    settings: GraphSettings,
    resources: ResourceManager,
    passes: Vec<Pass>,
    listeners: Vec<Box<dyn GraphListener>>,
    compiled: Option<CompiledSchedule>,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new(GraphSettings::default())
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("settings", &self.settings)
            .field("passes", &self.passes)
            .field("resources", &self.resources.len())
            .field("listeners", &self.listeners.len())
            .field("compiled", &self.compiled.is_some())
            .finish()
    }
}

impl RenderGraph {
    /// Create an empty graph.
    pub fn new(settings: GraphSettings) -> Self {
        let resources = ResourceManager::new(settings.pool_eviction_threshold);
        Self {
            settings,
            resources,
            passes: Vec::new(),
            listeners: Vec::new(),
            compiled: None,
        }
    }

    /// Graph settings.
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Declared resources and the allocation pools.
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Number of declared passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Whether the graph has been compiled since it was last cleared.
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    // -- Resources --

    /// Import a caller-owned buffer.
    pub fn import_buffer(&mut self, id: PropertyId, buffer: Arc<Buffer>) -> BufferHandle {
        self.resources.import_buffer(id, buffer)
    }

    /// Import a caller-owned texture.
    pub fn import_texture(&mut self, id: PropertyId, texture: Arc<Texture>) -> TextureHandle {
        self.resources.import_texture(id, texture)
    }

    /// Declare a transient buffer.
    pub fn create_buffer(&mut self, id: PropertyId, descriptor: BufferDescriptor) -> BufferHandle {
        self.resources.create_buffer(id, descriptor)
    }

    /// Declare a CPU-writable buffer and fill it with `bytes`.
    pub fn create_buffer_with_content(
        &mut self,
        id: PropertyId,
        descriptor: BufferDescriptor,
        bytes: &[u8],
    ) -> BufferHandle {
        self.resources
            .create_buffer_with_content(id, descriptor, bytes)
    }

    /// Declare a transient texture.
    pub fn create_texture(
        &mut self,
        id: PropertyId,
        descriptor: TextureDescriptor,
    ) -> TextureHandle {
        self.resources.create_texture(id, descriptor)
    }

    // -- Passes --

    /// Append a pass. Passes execute in the order they are added.
    ///
    /// Adding a pass to a compiled graph is a modeling error: it is logged and
    /// the compiled schedule is dropped, so the next compile starts over.
    pub fn add_pass(&mut self, name: &str) -> PassBuilder<'_> {
        if self.compiled.take().is_some() {
            log::error!("Pass '{name}' added to a compiled graph; the graph will be recompiled");
            for pass in &mut self.passes {
                pass.reset_schedule();
            }
            self.resources.reset_lifetimes();
        }
        PassBuilder::new(&mut self.passes, &mut self.resources, name)
    }

    /// Register a listener notified after every compilation.
    pub fn add_listener(&mut self, listener: Box<dyn GraphListener>) {
        self.listeners.push(listener);
    }

    // -- Frame --

    /// Compile the graph and return a snapshot of the result.
    ///
    /// Compiling twice in the same frame returns the existing result.
    pub fn compile(&mut self) -> CompiledGraphView {
        let schedule = self.compile_schedule();
        CompiledGraphView::build(&self.passes, &self.resources, schedule.fallback_wait)
    }

    fn compile_schedule(&mut self) -> CompiledSchedule {
        if let Some(schedule) = self.compiled {
            return schedule;
        }
        let schedule = compiler::compile(&mut self.passes, &mut self.resources, &self.settings);
        self.compiled = Some(schedule);

        if !self.listeners.is_empty() {
            let view =
                CompiledGraphView::build(&self.passes, &self.resources, schedule.fallback_wait);
            for listener in &mut self.listeners {
                listener.on_graph_compiled(&view);
            }
        }
        schedule
    }

    /// Record and submit the frame, compiling first if needed.
    ///
    /// The graph is cleared afterwards whether or not execution succeeded.
    pub fn execute(&mut self, device: &dyn GfxDevice) -> Result<(), GraphicsError> {
        let schedule = self.compile_schedule();
        let result = executor::execute(
            &mut self.passes,
            &mut self.resources,
            &schedule,
            device,
            &self.settings,
        );
        self.clear();
        frame_mark!();
        result
    }

    /// Compile and execute in one call.
    pub fn compile_and_execute(&mut self, device: &dyn GfxDevice) -> Result<(), GraphicsError> {
        self.compile_schedule();
        self.execute(device)
    }

    /// Drop every pass and declared resource.
    ///
    /// Handles issued before the call no longer resolve.
    pub fn clear(&mut self) {
        self.passes.clear();
        self.resources.clear();
        self.compiled = None;
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::device::{DeviceEvent, DummyDevice};
    use crate::types::{BufferUsage, CLEAR_BLACK, QueueType, TextureFormat};

    fn texture_desc() -> TextureDescriptor {
        TextureDescriptor::new_2d(32, 32, TextureFormat::Rgba16Float)
    }

    #[test]
    fn test_add_pass() {
        let mut graph = RenderGraph::default();
        let index = graph.add_pass("Geometry").index();
        assert_eq!(index, 0);
        assert_eq!(graph.pass_count(), 1);
    }

    #[test]
    fn test_clear() {
        let mut graph = RenderGraph::default();
        let texture = graph.create_texture(PropertyId(1), texture_desc());
        graph.add_pass("Geometry").write(texture);

        graph.clear();

        assert_eq!(graph.pass_count(), 0);
        assert!(graph.resources().is_empty());
        assert!(graph.resources().texture_descriptor(texture).is_none());
    }

    #[test]
    fn test_compile_is_cached() {
        let mut graph = RenderGraph::default();
        graph.add_pass("Side effect").allow_culling(false);

        let first = graph.compile();
        let second = graph.compile();

        assert!(graph.is_compiled());
        assert_eq!(first, second);
    }

    #[test]
    fn test_add_pass_after_compile_recompiles() {
        let mut graph = RenderGraph::default();
        let texture = graph.create_texture(PropertyId(1), texture_desc());
        graph.add_pass("Produce").write(texture);
        graph.add_pass("Present").allow_culling(false);

        let first = graph.compile();
        assert_eq!(first.surviving_names(), vec!["Present"]);

        graph.add_pass("Consume").read(texture).allow_culling(false);
        assert!(!graph.is_compiled());

        let second = graph.compile();
        assert_eq!(second.surviving_names(), vec!["Produce", "Present", "Consume"]);
    }

    #[test]
    fn test_listener_sees_compiled_graph() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut graph = RenderGraph::default();
        {
            let seen = seen.clone();
            graph.add_listener(Box::new(move |view: &CompiledGraphView| {
                seen.borrow_mut().push(view.surviving_names().join(","));
            }));
        }

        let texture = graph.create_texture(PropertyId(1), texture_desc());
        graph.add_pass("Unused").write(texture);
        graph.add_pass("Present").allow_culling(false);

        graph.compile();
        graph.compile();

        assert_eq!(*seen.borrow(), vec!["Present".to_string()]);
    }

    #[test]
    fn test_execute_clears_graph() {
        let device = DummyDevice::new();
        let mut graph = RenderGraph::default();
        let color = graph.create_texture(PropertyId(1), texture_desc());
        graph
            .add_pass("Clear")
            .set_color_target(color, 0, ColorTargetInit::Clear(CLEAR_BLACK))
            .allow_culling(false);

        graph.compile_and_execute(&device).unwrap();

        assert_eq!(graph.pass_count(), 0);
        assert!(!graph.is_compiled());
        assert_eq!(graph.resources().pooled_texture_count(), 1);
        assert_eq!(device.submissions(QueueType::Direct).len(), 1);
    }

    #[test]
    fn test_execute_empty_graph() {
        let device = DummyDevice::new();
        let mut graph = RenderGraph::default();

        graph.compile_and_execute(&device).unwrap();

        assert!(device.events().is_empty());
    }

    #[test]
    fn test_pooled_buffer_reused_across_frames() {
        let device = DummyDevice::new();
        let mut graph = RenderGraph::default();

        for _ in 0..3 {
            let buffer = graph.create_buffer(
                PropertyId(7),
                BufferDescriptor::new(4, 256, BufferUsage::RW_STRUCTURED),
            );
            graph.add_pass("Fill").write(buffer);
            graph.add_pass("Consume").read(buffer).allow_culling(false);
            graph.compile_and_execute(&device).unwrap();
        }

        assert_eq!(graph.resources().pooled_buffer_count(), 1);
        assert!(matches!(
            device.events().last(),
            Some(DeviceEvent::Submit {
                queue: QueueType::Direct,
                ..
            })
        ));
    }
}
