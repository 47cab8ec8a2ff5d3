//! Common utilities for render graph integration tests.
//!
//! Every test runs against [`DummyDevice`], whose event log stands in for
//! what a real device would have been asked to do.

use std::sync::Arc;

use ember_graphics::{
    BufferDescriptor, BufferHandle, BufferUsage, DeviceEvent, DummyDevice, PropertyId,
    QueueType, RenderGraph, Texture, TextureDescriptor, TextureFormat, TextureHandle,
};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Event Inspection
// ============================================================================

/// Shape of a device event without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A command list was submitted to the queue.
    Submit(QueueType),
    /// The queue waits on a sync point issued by another submission.
    Wait(QueueType),
}

/// Reduce an event log to its submit/wait shape.
pub fn steps(events: &[DeviceEvent]) -> Vec<Step> {
    events
        .iter()
        .map(|event| match event {
            DeviceEvent::Submit { queue, .. } => Step::Submit(*queue),
            DeviceEvent::GpuWait { queue, .. } => Step::Wait(*queue),
        })
        .collect()
}

/// Assert that every wait in the log targets a sync point submitted earlier.
pub fn assert_waits_are_satisfiable(events: &[DeviceEvent]) {
    for (index, event) in events.iter().enumerate() {
        if let DeviceEvent::GpuWait { sync_point, .. } = event {
            let submitted = events[..index].iter().any(|earlier| {
                matches!(earlier, DeviceEvent::Submit { sync_point: sp, .. } if sp == sync_point)
            });
            assert!(submitted, "wait on {sync_point} precedes its submission");
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// A graph plus the device it executes on.
pub struct TestContext {
    /// Recording device.
    pub device: DummyDevice,
    /// Graph under test.
    pub graph: RenderGraph,
}

impl TestContext {
    /// Create a context with default graph settings.
    pub fn new() -> Self {
        init_logging();
        Self {
            device: DummyDevice::new(),
            graph: RenderGraph::default(),
        }
    }

    /// Declare a 64x64 transient color texture.
    pub fn color_texture(&mut self, id: i32) -> TextureHandle {
        self.graph.create_texture(
            PropertyId(id),
            TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba16Float),
        )
    }

    /// Declare a transient read/write structured buffer.
    pub fn rw_buffer(&mut self, id: i32) -> BufferHandle {
        self.graph.create_buffer(
            PropertyId(id),
            BufferDescriptor::new(16, 256, BufferUsage::RW_STRUCTURED),
        )
    }

    /// Import a caller-owned texture standing in for the swapchain image.
    pub fn backbuffer(&mut self) -> (Arc<Texture>, TextureHandle) {
        let texture = Arc::new(Texture::new(
            "Backbuffer",
            TextureDescriptor::new_2d(64, 64, TextureFormat::Bgra8Unorm),
        ));
        let handle = self.graph.import_texture(PropertyId(1000), texture.clone());
        (texture, handle)
    }

    /// Compile and execute the current graph, returning the device events it
    /// produced.
    pub fn run_frame(&mut self) -> Vec<DeviceEvent> {
        self.device.take_events();
        self.graph
            .compile_and_execute(&self.device)
            .expect("frame should execute");
        self.device.take_events()
    }
}
