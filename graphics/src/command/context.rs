//! Stateful command recorder.

use std::collections::HashMap;
use std::sync::Arc;

use super::barrier::{BarrierBatch, ResourceBarrier};
use super::pipeline::{Pipeline, PipelineId, PipelineKind, ShaderParameters, ShaderSlot};
use super::recorded::{
    DrawArgs, IndexBufferView, IndexedDrawArgs, OutputDesc, Predication, PredicationOp,
    RecordedCommand, TargetView, TextureView, VertexBufferView,
};
use crate::device::SyncPoint;
use crate::error::GraphicsError;
use crate::resources::{Buffer, GpuResource, ResourceId, Texture};
use crate::types::{
    BufferUsage, ClearColor, DepthBias, PrimitiveTopology, PropertyId, QueueType, ResourceStates,
    ScissorRect, Viewport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BindingKind {
    Texture,
    Buffer,
}

/// Everything the context has already told the native list.
#[derive(Debug, Default)]
struct StateCache {
    pipeline: Option<PipelineId>,
    pipeline_dirty: bool,
    output: OutputDesc,
    output_dirty: bool,
    topology: Option<PrimitiveTopology>,
    vertex_buffer: Option<VertexBufferView>,
    index_buffer: Option<IndexBufferView>,
    color_targets: Vec<TextureView>,
    depth_target: Option<TextureView>,
    target_keys: Option<(Vec<TargetView>, Option<TargetView>)>,
    viewports: Vec<Viewport>,
    scissor_rects: Vec<ScissorRect>,
    predication: Option<Predication>,
    stencil_ref: Option<u8>,
    bindings: HashMap<(BindingKind, u32), ResourceId>,
}

/// Resources bound by property id for every draw and dispatch.
#[derive(Debug, Default)]
struct GlobalVariables {
    textures: HashMap<PropertyId, Arc<Texture>>,
    buffers: HashMap<PropertyId, Arc<Buffer>>,
    instance_buffer: Option<Arc<Buffer>>,
    material_constants: Option<Arc<Buffer>>,
}

/// Records GPU work for one queue.
///
/// The context remembers what it last bound and drops redundant state
/// changes, collects resource transitions until the next command that needs
/// them, and resolves shader parameters into bindings at draw time.
///
/// Contexts are handed out by a [`GfxDevice`](crate::GfxDevice) already open
/// and go back to it on submit, which clears every cached state.
///
/// # Example
///
/// ```
/// use ember_graphics::{CommandContext, QueueType, Viewport};
///
/// let mut ctx = CommandContext::new(QueueType::Direct);
/// ctx.set_viewport(Viewport::from_dimensions(64, 64));
/// ctx.set_viewport(Viewport::from_dimensions(64, 64));
/// assert_eq!(ctx.commands().len(), 1);
/// ```
#[derive(Debug)]
pub struct CommandContext {
    queue: QueueType,
    open: bool,
    commands: Vec<RecordedCommand>,
    barriers: BarrierBatch,
    waits: Vec<SyncPoint>,
    event_depth: u32,
    cache: StateCache,
    globals: GlobalVariables,
}

impl CommandContext {
    /// Create an open context for `queue`.
    pub fn new(queue: QueueType) -> Self {
        Self {
            queue,
            open: true,
            commands: Vec::new(),
            barriers: BarrierBatch::new(),
            waits: Vec::new(),
            event_depth: 0,
            cache: StateCache::default(),
            globals: GlobalVariables::default(),
        }
    }

    /// Queue this context records for.
    pub fn queue(&self) -> QueueType {
        self.queue
    }

    /// Whether the context still accepts commands.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Sync points the queue must reach before this list runs.
    pub fn pending_waits(&self) -> &[SyncPoint] {
        &self.waits
    }

    /// Number of barriers queued but not yet flushed.
    pub fn pending_barrier_count(&self) -> usize {
        self.barriers.len()
    }

    /// Make the list wait for `sync_point` before it starts executing.
    pub fn wait_on_gpu(&mut self, sync_point: SyncPoint) {
        if !self.waits.contains(&sync_point) {
            self.waits.push(sync_point);
        }
    }

    /// Flush pending barriers and stop accepting commands.
    pub fn close(&mut self) -> Result<(), GraphicsError> {
        self.ensure_open()?;
        if self.event_depth > 0 {
            log::warn!(
                "Closing context with {} unbalanced debug events",
                self.event_depth
            );
        }
        self.flush_resource_barriers();
        self.open = false;
        Ok(())
    }

    /// Hand the recording to the device.
    pub(crate) fn take_recording(&mut self) -> (Vec<RecordedCommand>, Vec<SyncPoint>) {
        (
            std::mem::take(&mut self.commands),
            std::mem::take(&mut self.waits),
        )
    }

    /// Clear all recorded work and cached state, then reopen.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.barriers.clear();
        self.waits.clear();
        self.event_depth = 0;
        self.cache = StateCache::default();
        self.globals = GlobalVariables::default();
        self.open = true;
    }

    // -- Barriers --

    /// Queue a transition of `resource` (or one of its subresources) to
    /// `target`.
    ///
    /// Nothing is queued when the tracked state already satisfies the target.
    pub fn transition_resource(
        &mut self,
        resource: &dyn GpuResource,
        target: ResourceStates,
        subresource: Option<u32>,
    ) -> Result<(), GraphicsError> {
        self.ensure_open()?;
        let changes = {
            let mut state = resource.state();
            state.transition(subresource, target)
        }
        .map_err(|_| GraphicsError::StateLocked(resource.name().to_string()))?;

        for change in changes {
            self.barriers.add(ResourceBarrier {
                resource: resource.id(),
                subresource: change.subresource,
                before: change.before,
                after: change.after,
            });
        }
        Ok(())
    }

    /// Emit every queued barrier as one command.
    pub fn flush_resource_barriers(&mut self) {
        if self.barriers.is_empty() {
            return;
        }
        let barriers = self.barriers.take();
        log::trace!("Flushing {} barriers on {}", barriers.len(), self.queue);
        self.push(RecordedCommand::ResourceBarriers(barriers));
    }

    // -- Cached state --

    /// Select the pipeline used by the next draw or dispatch.
    ///
    /// Changing the pipeline forgets every cached binding.
    pub fn set_pipeline(&mut self, pipeline: &Pipeline) {
        if self.cache.pipeline == Some(pipeline.id()) {
            return;
        }
        self.cache.pipeline = Some(pipeline.id());
        self.cache.pipeline_dirty = true;
        self.cache.bindings.clear();
    }

    /// Set the primitive topology.
    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        if self.cache.topology == Some(topology) {
            return;
        }
        self.cache.topology = Some(topology);
        self.push(RecordedCommand::SetPrimitiveTopology(topology));
    }

    /// Bind a vertex buffer.
    pub fn set_vertex_buffer(&mut self, buffer: &Buffer) -> Result<(), GraphicsError> {
        self.transition_resource(buffer, ResourceStates::VERTEX_AND_CONSTANT_BUFFER, None)?;
        let view = VertexBufferView::of(buffer);
        if self.cache.vertex_buffer != Some(view) {
            self.cache.vertex_buffer = Some(view);
            self.push(RecordedCommand::SetVertexBuffer(view));
        }
        Ok(())
    }

    /// Bind an index buffer.
    pub fn set_index_buffer(&mut self, buffer: &Buffer) -> Result<(), GraphicsError> {
        self.transition_resource(buffer, ResourceStates::INDEX_BUFFER, None)?;
        let view = IndexBufferView::of(buffer);
        if self.cache.index_buffer != Some(view) {
            self.cache.index_buffer = Some(view);
            self.push(RecordedCommand::SetIndexBuffer(view));
        }
        Ok(())
    }

    /// Bind color targets and an optional depth target.
    ///
    /// Targets are transitioned to their write states. The output
    /// description of the bound pipeline follows the new formats.
    pub fn set_render_targets(
        &mut self,
        colors: &[TextureView],
        depth: Option<&TextureView>,
    ) -> Result<(), GraphicsError> {
        for view in colors {
            self.transition_resource(
                view.texture().as_ref(),
                ResourceStates::RENDER_TARGET,
                Some(view.subresource()),
            )?;
        }
        if let Some(view) = depth {
            self.transition_resource(
                view.texture().as_ref(),
                ResourceStates::DEPTH_WRITE,
                Some(view.subresource()),
            )?;
        }

        let keys = (
            colors.iter().map(TextureView::target).collect::<Vec<_>>(),
            depth.map(TextureView::target),
        );
        if self.cache.target_keys.as_ref() == Some(&keys) {
            return Ok(());
        }

        self.cache.color_targets = colors.to_vec();
        self.cache.depth_target = depth.cloned();

        let color_formats: Vec<_> = colors.iter().map(|v| v.texture().format()).collect();
        let depth_format = depth.map(|v| v.texture().format());
        let sample_count = colors
            .first()
            .or(depth)
            .map(|v| v.texture().sample_count())
            .unwrap_or(1);
        self.update_output(|output| {
            output.color_formats = color_formats;
            output.depth_format = depth_format;
            output.sample_count = sample_count;
        });

        self.push(RecordedCommand::SetRenderTargets {
            colors: keys.0.clone(),
            depth: keys.1,
        });
        self.cache.target_keys = Some(keys);
        Ok(())
    }

    /// Set a single viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.set_viewports(&[viewport]);
    }

    /// Set viewports.
    pub fn set_viewports(&mut self, viewports: &[Viewport]) {
        if self.cache.viewports == viewports {
            return;
        }
        self.cache.viewports = viewports.to_vec();
        self.push(RecordedCommand::SetViewports(viewports.to_vec()));
    }

    /// Set a single scissor rectangle.
    pub fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.set_scissor_rects(&[rect]);
    }

    /// Set scissor rectangles.
    pub fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        if self.cache.scissor_rects == rects {
            return;
        }
        self.cache.scissor_rects = rects.to_vec();
        self.push(RecordedCommand::SetScissorRects(rects.to_vec()));
    }

    /// Cover the first bound target with the viewport.
    pub fn set_default_viewport(&mut self) {
        match self.first_target_size() {
            Some((width, height)) => self.set_viewport(Viewport::from_dimensions(width, height)),
            None => log::warn!("Can not set default viewport without a render target"),
        }
    }

    /// Cover the first bound target with the scissor rectangle.
    pub fn set_default_scissor_rect(&mut self) {
        match self.first_target_size() {
            Some((width, height)) => {
                self.set_scissor_rect(ScissorRect::from_dimensions(width, height))
            }
            None => log::warn!("Can not set default scissor rect without a render target"),
        }
    }

    /// Set the rasterizer depth bias.
    pub fn set_depth_bias(&mut self, bias: DepthBias) {
        self.update_output(|output| output.depth_bias = bias);
    }

    /// Toggle wireframe rasterization.
    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.update_output(|output| output.wireframe = wireframe);
    }

    /// Enable predication from `buffer` at `offset`, or disable it with `None`.
    pub fn set_predication(
        &mut self,
        predicate: Option<(&Buffer, u64, PredicationOp)>,
    ) -> Result<(), GraphicsError> {
        let predication = match predicate {
            Some((buffer, offset, op)) => {
                self.transition_resource(buffer, ResourceStates::PREDICATION, None)?;
                Some(Predication {
                    buffer: buffer.id(),
                    offset,
                    op,
                })
            }
            None => None,
        };
        if self.cache.predication != predication {
            self.cache.predication = predication;
            self.push(RecordedCommand::SetPredication(predication));
        }
        Ok(())
    }

    /// Set the stencil reference value.
    pub fn set_stencil_ref(&mut self, value: u8) {
        if self.cache.stencil_ref == Some(value) {
            return;
        }
        self.cache.stencil_ref = Some(value);
        self.push(RecordedCommand::SetStencilRef(value));
    }

    // -- Global variables --

    /// Bind `texture` to every slot reading `id`.
    pub fn set_global_texture(&mut self, id: PropertyId, texture: Arc<Texture>) {
        self.globals.textures.insert(id, texture);
    }

    /// Bind `buffer` to every slot reading `id`.
    pub fn set_global_buffer(&mut self, id: PropertyId, buffer: Arc<Buffer>) {
        self.globals.buffers.insert(id, buffer);
    }

    /// Remove a global texture.
    pub fn unset_global_texture(&mut self, id: PropertyId) {
        self.globals.textures.remove(&id);
    }

    /// Remove a global buffer.
    pub fn unset_global_buffer(&mut self, id: PropertyId) {
        self.globals.buffers.remove(&id);
    }

    /// Buffer bound to `_InstanceBuffer` when nothing else provides it.
    pub fn set_instance_buffer(&mut self, buffer: Option<Arc<Buffer>>) {
        self.globals.instance_buffer = buffer;
    }

    /// Buffer bound to `_MaterialConstants` when nothing else provides it.
    pub fn set_material_constants(&mut self, buffer: Option<Arc<Buffer>>) {
        self.globals.material_constants = buffer;
    }

    // -- Work --

    /// Draw with a graphics pipeline.
    pub fn draw(
        &mut self,
        pipeline: &Pipeline,
        parameters: &ShaderParameters,
        args: DrawArgs,
    ) -> Result<(), GraphicsError> {
        self.prepare_graphics(pipeline, parameters)?;
        self.push(RecordedCommand::Draw(args));
        Ok(())
    }

    /// Draw indexed geometry from the bound index buffer.
    pub fn draw_indexed(
        &mut self,
        pipeline: &Pipeline,
        parameters: &ShaderParameters,
        args: IndexedDrawArgs,
    ) -> Result<(), GraphicsError> {
        if self.cache.index_buffer.is_none() {
            return Err(GraphicsError::InvalidParameter(format!(
                "indexed draw with '{}' has no index buffer bound",
                pipeline.name()
            )));
        }
        self.prepare_graphics(pipeline, parameters)?;
        self.push(RecordedCommand::DrawIndexed(args));
        Ok(())
    }

    /// Dispatch a compute pipeline.
    pub fn dispatch(
        &mut self,
        pipeline: &Pipeline,
        parameters: &ShaderParameters,
        x: u32,
        y: u32,
        z: u32,
    ) -> Result<(), GraphicsError> {
        self.ensure_open()?;
        if pipeline.kind() != PipelineKind::Compute {
            return Err(GraphicsError::InvalidParameter(format!(
                "'{}' is not a compute pipeline",
                pipeline.name()
            )));
        }
        self.set_pipeline(pipeline);
        if self.cache.pipeline_dirty {
            self.cache.pipeline_dirty = false;
            self.push(RecordedCommand::SetComputePipeline(pipeline.id()));
        }
        self.resolve_parameters(pipeline, parameters)?;
        self.flush_resource_barriers();
        self.push(RecordedCommand::Dispatch { x, y, z });
        Ok(())
    }

    /// Clear a color target.
    pub fn clear_color_target(
        &mut self,
        view: &TextureView,
        color: ClearColor,
    ) -> Result<(), GraphicsError> {
        self.transition_resource(
            view.texture().as_ref(),
            ResourceStates::RENDER_TARGET,
            Some(view.subresource()),
        )?;
        self.flush_resource_barriers();
        self.push(RecordedCommand::ClearColor {
            target: view.target(),
            color,
        });
        Ok(())
    }

    /// Clear a depth/stencil target.
    pub fn clear_depth_stencil_target(
        &mut self,
        view: &TextureView,
        depth: f32,
        stencil: u8,
    ) -> Result<(), GraphicsError> {
        self.transition_resource(
            view.texture().as_ref(),
            ResourceStates::DEPTH_WRITE,
            Some(view.subresource()),
        )?;
        self.flush_resource_barriers();
        self.push(RecordedCommand::ClearDepthStencil {
            target: view.target(),
            depth,
            stencil,
        });
        Ok(())
    }

    /// Mark the contents of a target as undefined.
    pub fn discard_target(&mut self, view: &TextureView) -> Result<(), GraphicsError> {
        self.ensure_open()?;
        self.flush_resource_barriers();
        self.push(RecordedCommand::Discard(view.target()));
        Ok(())
    }

    /// Copy the whole of `src` into `dst`.
    pub fn copy_buffer(&mut self, src: &Buffer, dst: &Buffer) -> Result<(), GraphicsError> {
        if dst.size() < src.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "copy from '{}' ({} bytes) does not fit into '{}' ({} bytes)",
                src.name(),
                src.size(),
                dst.name(),
                dst.size()
            )));
        }
        self.transition_resource(src, ResourceStates::COPY_SOURCE, None)?;
        self.transition_resource(dst, ResourceStates::COPY_DEST, None)?;
        self.flush_resource_barriers();
        self.push(RecordedCommand::CopyBuffer {
            src: src.id(),
            dst: dst.id(),
            size: src.size(),
        });
        Ok(())
    }

    /// Copy every subresource of `src` into `dst`.
    pub fn copy_texture(&mut self, src: &Texture, dst: &Texture) -> Result<(), GraphicsError> {
        let (a, b) = (src.descriptor(), dst.descriptor());
        if a.width != b.width || a.height != b.height || a.format != b.format {
            return Err(GraphicsError::InvalidParameter(format!(
                "textures '{}' and '{}' differ in size or format",
                src.name(),
                dst.name()
            )));
        }
        self.transition_resource(src, ResourceStates::COPY_SOURCE, None)?;
        self.transition_resource(dst, ResourceStates::COPY_DEST, None)?;
        self.flush_resource_barriers();
        self.push(RecordedCommand::CopyTexture {
            src: src.id(),
            dst: dst.id(),
        });
        Ok(())
    }

    /// Open a named debug region.
    pub fn begin_event(&mut self, name: &str) {
        self.event_depth += 1;
        self.push(RecordedCommand::BeginEvent(name.to_string()));
    }

    /// Close the innermost debug region.
    pub fn end_event(&mut self) {
        if self.event_depth == 0 {
            log::warn!("end_event without matching begin_event");
            return;
        }
        self.event_depth -= 1;
        self.push(RecordedCommand::EndEvent);
    }

    // -- Internals --

    fn ensure_open(&self) -> Result<(), GraphicsError> {
        if self.open {
            Ok(())
        } else {
            Err(GraphicsError::ContextClosed)
        }
    }

    fn push(&mut self, command: RecordedCommand) {
        if !self.open {
            log::error!("Recording {command:?} into a closed context");
            return;
        }
        self.commands.push(command);
    }

    fn update_output(&mut self, update: impl FnOnce(&mut OutputDesc)) {
        let mut output = self.cache.output.clone();
        update(&mut output);
        if output != self.cache.output {
            self.cache.output = output;
            self.cache.output_dirty = true;
        }
    }

    fn first_target_size(&self) -> Option<(u32, u32)> {
        self.cache
            .color_targets
            .first()
            .or(self.cache.depth_target.as_ref())
            .map(|view| (view.width(), view.height()))
    }

    fn prepare_graphics(
        &mut self,
        pipeline: &Pipeline,
        parameters: &ShaderParameters,
    ) -> Result<(), GraphicsError> {
        self.ensure_open()?;
        if pipeline.kind() != PipelineKind::Graphics {
            return Err(GraphicsError::InvalidParameter(format!(
                "'{}' is not a graphics pipeline",
                pipeline.name()
            )));
        }
        self.set_pipeline(pipeline);
        self.set_primitive_topology(pipeline.topology());
        if self.cache.pipeline_dirty || self.cache.output_dirty {
            self.cache.pipeline_dirty = false;
            self.cache.output_dirty = false;
            self.push(RecordedCommand::SetGraphicsPipeline {
                pipeline: pipeline.id(),
                output: self.cache.output.clone(),
            });
        }
        self.resolve_parameters(pipeline, parameters)?;
        self.flush_resource_barriers();
        Ok(())
    }

    /// Bind every slot of `pipeline`: overrides first, then globals, then
    /// the built-in aliases. Slots nothing provides stay unbound.
    fn resolve_parameters(
        &mut self,
        pipeline: &Pipeline,
        parameters: &ShaderParameters,
    ) -> Result<(), GraphicsError> {
        let read_state = match pipeline.kind() {
            PipelineKind::Graphics => ResourceStates::ALL_SHADER_RESOURCE,
            PipelineKind::Compute => ResourceStates::NON_PIXEL_SHADER_RESOURCE,
        };

        for slot in pipeline.texture_slots() {
            let texture = parameters
                .texture(slot.id)
                .or_else(|| self.globals.textures.get(&slot.id))
                .cloned();
            let Some(texture) = texture else {
                continue;
            };
            let state = if slot.writable {
                ResourceStates::UNORDERED_ACCESS
            } else {
                read_state
            };
            self.transition_resource(texture.as_ref(), state, None)?;
            self.bind(BindingKind::Texture, slot, texture.id());
        }

        for slot in pipeline.buffer_slots() {
            let buffer = parameters
                .buffer(slot.id)
                .or_else(|| self.globals.buffers.get(&slot.id))
                .or_else(|| self.builtin_buffer(slot.id))
                .cloned();
            let Some(buffer) = buffer else {
                continue;
            };
            let state = if slot.writable {
                ResourceStates::UNORDERED_ACCESS
            } else if buffer.descriptor().usage.contains(BufferUsage::CONSTANT) {
                ResourceStates::VERTEX_AND_CONSTANT_BUFFER
            } else {
                read_state
            };
            self.transition_resource(buffer.as_ref(), state, None)?;
            self.bind(BindingKind::Buffer, slot, buffer.id());
        }
        Ok(())
    }

    fn builtin_buffer(&self, id: PropertyId) -> Option<&Arc<Buffer>> {
        if id == PropertyId::INSTANCE_BUFFER {
            self.globals.instance_buffer.as_ref()
        } else if id == PropertyId::MATERIAL_CONSTANTS {
            self.globals.material_constants.as_ref()
        } else {
            None
        }
    }

    fn bind(&mut self, kind: BindingKind, slot: &ShaderSlot, resource: ResourceId) {
        if self.cache.bindings.get(&(kind, slot.register)) == Some(&resource) {
            return;
        }
        self.cache.bindings.insert((kind, slot.register), resource);
        self.push(RecordedCommand::BindResource {
            slot: slot.id,
            register: slot.register,
            resource,
            writable: slot.writable,
        });
    }
}
