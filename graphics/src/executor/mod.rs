//! Render graph execution.
//!
//! Walks a compiled graph in submission order and turns each surviving pass
//! into recorded work:
//!
//! 1. Back the resources born before the pass
//! 2. Pick a context: stay on the open one, open a fresh direct context that
//!    waits on an async pass, or start an async compute run
//! 3. Bind render targets and rasterizer state
//! 4. Bind default variables, run the callback, unbind
//! 5. Release the resources that die after the pass
//! 6. Submit when the pass ends an async run
//!
//! The frame ends by submitting whatever is open and, if an async pass had
//! nobody waiting on it, making the direct queue wait for it.

use std::collections::BTreeMap;

use ember_core::{profile_function, profile_scope_dynamic};

use crate::command::{CommandContext, TextureView};
use crate::compiler::{CompiledSchedule, surviving_passes};
use crate::device::{GfxDevice, SyncPoint};
use crate::error::GraphicsError;
use crate::graph::{
    ColorTargetInit, DepthStencilInit, GraphSettings, Pass, PassContext, ResourceManager,
    TextureSlice,
};
use crate::types::{QueueType, ResourceStates};

/// Record and submit every surviving pass.
///
/// A device error stops the pass walk; the open context is still submitted
/// and the end-of-frame wait still issued before the error is returned.
pub(crate) fn execute(
    passes: &mut [Pass],
    resources: &mut ResourceManager,
    schedule: &CompiledSchedule,
    device: &dyn GfxDevice,
    settings: &GraphSettings,
) -> Result<(), GraphicsError> {
    profile_function!();

    let mut executor = Executor {
        device,
        settings,
        context: None,
    };
    let walk = executor.run(passes, resources);
    if let Err(err) = &walk {
        log::error!("Render graph execution failed: {err}");
    }
    let finish = executor.finish(passes, schedule);
    if let Err(err) = &finish {
        log::error!("Failed to finish render graph frame: {err}");
    }
    walk.and(finish)
}

struct Executor<'a> {
    device: &'a dyn GfxDevice,
    settings: &'a GraphSettings,
    context: Option<CommandContext>,
}

impl Executor<'_> {
    fn run(
        &mut self,
        passes: &mut [Pass],
        resources: &mut ResourceManager,
    ) -> Result<(), GraphicsError> {
        for index in surviving_passes(passes) {
            for &resource in &passes[index].resources_born {
                resources.request_resource(resource);
            }

            self.ensure_context(passes, resources, index)?;
            self.record_pass(passes, resources, index)?;

            for &resource in &passes[index].resources_dead {
                resources.release_resource(resource);
            }

            if passes[index].need_sync_point {
                if let Some(context) = self.context.take() {
                    let sync_point = self.device.submit_and_recycle(context)?;
                    log::trace!("Pass '{}' signals {sync_point}", passes[index].name);
                    passes[index].sync_point = Some(sync_point);
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, passes: &[Pass], schedule: &CompiledSchedule) -> Result<(), GraphicsError> {
        let submitted = self.submit_current();

        let waited = match schedule.fallback_wait {
            Some(wait) => match passes[wait].sync_point {
                Some(sync_point) => self.device.wait_on_gpu(QueueType::Direct, sync_point),
                None => {
                    log::warn!(
                        "Pass '{}' never signaled; skipping end-of-frame wait",
                        passes[wait].name
                    );
                    Ok(())
                }
            },
            None => Ok(()),
        };
        submitted.and(waited)
    }

    fn submit_current(&mut self) -> Result<(), GraphicsError> {
        match self.context.take() {
            Some(context) => self.device.submit_and_recycle(context).map(|_| ()),
            None => Ok(()),
        }
    }

    fn open_context(&mut self, queue: QueueType) -> Result<&mut CommandContext, GraphicsError> {
        let context = self.device.request_context(queue)?;
        Ok(self.context.insert(context))
    }

    fn ensure_context(
        &mut self,
        passes: &[Pass],
        resources: &ResourceManager,
        index: usize,
    ) -> Result<(), GraphicsError> {
        let pass = &passes[index];
        let open_queue = self.context.as_ref().map(CommandContext::queue);

        if pass.is_async_compute {
            if pass.is_batched_with_previous {
                if open_queue != Some(QueueType::AsyncCompute) {
                    return Err(GraphicsError::Internal(format!(
                        "batched async pass '{}' has no open async context",
                        pass.name
                    )));
                }
                return Ok(());
            }
            return self.begin_async_run(passes, resources, index);
        }

        if let Some(wait) = pass.pass_index_to_wait {
            let sync_point = passes[wait].sync_point.ok_or_else(|| {
                GraphicsError::Internal(format!(
                    "pass '{}' waits on '{}', which has no sync point",
                    pass.name, passes[wait].name
                ))
            })?;
            self.submit_current()?;
            self.open_context(QueueType::Direct)?.wait_on_gpu(sync_point);
            return Ok(());
        }

        if open_queue != Some(QueueType::Direct) {
            self.submit_current()?;
            self.open_context(QueueType::Direct)?;
        }
        Ok(())
    }

    /// Move every resource of the run starting at `first` into its compute
    /// state on the direct queue, then open an async context after it.
    ///
    /// Shared reads go to the generic read state so direct passes running
    /// alongside the run never need a barrier on them.
    fn begin_async_run(
        &mut self,
        passes: &[Pass],
        resources: &ResourceManager,
        first: usize,
    ) -> Result<(), GraphicsError> {
        let run: Vec<usize> = std::iter::once(first)
            .chain(
                (first + 1..passes.len())
                    .filter(|&i| !passes[i].is_culled)
                    .take_while(|&i| passes[i].is_batched_with_previous),
            )
            .collect();

        let mut states: BTreeMap<usize, ResourceStates> = BTreeMap::new();
        for &member in &run {
            for resource in passes[member].touched_resources() {
                let state = if passes[member].writes(resource) {
                    ResourceStates::UNORDERED_ACCESS
                } else if resources.is_generically_readable(resource) {
                    ResourceStates::GENERIC_READ
                } else {
                    ResourceStates::NON_PIXEL_SHADER_RESOURCE
                };
                let entry = states.entry(resource).or_insert(state);
                if state == ResourceStates::UNORDERED_ACCESS {
                    *entry = state;
                }
            }
        }

        let direct = match self.context.take() {
            Some(context) if context.queue() == QueueType::Direct => context,
            other => {
                if let Some(context) = other {
                    self.device.submit_and_recycle(context)?;
                }
                self.device.request_context(QueueType::Direct)?
            }
        };
        let direct = self.context.insert(direct);
        for (&resource, &state) in &states {
            transition(direct, resources, resource, state)?;
        }
        let handoff = self.submit_context()?;

        let context = self.open_context(QueueType::AsyncCompute)?;
        context.wait_on_gpu(handoff);
        for &member in &run {
            if let Some(wait) = passes[member].pass_index_to_wait {
                if let Some(sync_point) = passes[wait].sync_point {
                    context.wait_on_gpu(sync_point);
                }
            }
        }
        log::trace!(
            "Async run of {} passes starting at '{}'",
            run.len(),
            passes[first].name
        );
        Ok(())
    }

    fn submit_context(&mut self) -> Result<SyncPoint, GraphicsError> {
        let context = self
            .context
            .take()
            .ok_or_else(|| GraphicsError::Internal("no open context to submit".to_string()))?;
        self.device.submit_and_recycle(context)
    }

    fn record_pass(
        &mut self,
        passes: &mut [Pass],
        resources: &ResourceManager,
        index: usize,
    ) -> Result<(), GraphicsError> {
        let markers = self.settings.debug_markers;
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| GraphicsError::Internal("no open context".to_string()))?;
        let pass = &mut passes[index];

        if markers {
            context.begin_event(&pass.name);
        }
        let result = {
            profile_scope_dynamic!(pass.name.as_str());
            record_pass_work(pass, context, resources)
        };
        if markers {
            context.end_event();
        }
        result
    }
}

/// Render states, default variables and the callback of one pass.
fn record_pass_work(
    pass: &mut Pass,
    context: &mut CommandContext,
    resources: &ResourceManager,
) -> Result<(), GraphicsError> {
    apply_render_states(pass, context, resources)?;

    let variables = if pass.use_default_variables {
        pass.variables().into_iter().collect()
    } else {
        Vec::new()
    };
    bind_variables(context, resources, &variables);

    let result = match pass.render_func.take() {
        Some(func) => {
            let mut pass_context = PassContext::new(&pass.name, context, resources);
            func(&mut pass_context)
        }
        None => {
            log::warn!("Render function is not set in pass '{}'", pass.name);
            Ok(())
        }
    };

    unbind_variables(context, resources, &variables);
    result.map_err(|err| GraphicsError::PassFailed {
        pass: pass.name.clone(),
        message: err.to_string(),
    })
}

fn transition(
    context: &mut CommandContext,
    resources: &ResourceManager,
    resource: usize,
    state: ResourceStates,
) -> Result<(), GraphicsError> {
    if let Some(buffer) = resources.buffer_at(resource) {
        return context.transition_resource(buffer.as_ref(), state, None);
    }
    if let Some(texture) = resources.texture_at(resource) {
        return context.transition_resource(texture.as_ref(), state, None);
    }
    Err(not_allocated(resources, resource))
}

fn not_allocated(resources: &ResourceManager, resource: usize) -> GraphicsError {
    GraphicsError::Internal(format!(
        "resource '{}' is used while not allocated",
        resources.name(resource)
    ))
}

fn target_view(
    resources: &ResourceManager,
    slice: TextureSlice,
    resource: usize,
) -> Result<TextureView, GraphicsError> {
    let texture = resources
        .texture_at(resource)
        .ok_or_else(|| not_allocated(resources, resource))?;
    Ok(TextureView::new(texture)
        .with_mip_level(slice.mip_level())
        .with_array_slice(slice.array_slice()))
}

fn apply_render_states(
    pass: &Pass,
    context: &mut CommandContext,
    resources: &ResourceManager,
) -> Result<(), GraphicsError> {
    if !pass.has_render_targets() {
        return Ok(());
    }
    if pass.is_async_compute {
        log::error!(
            "Async compute pass '{}' can not bind render targets",
            pass.name
        );
        return Ok(());
    }

    let mut colors = Vec::new();
    let mut color_inits = Vec::new();
    for target in pass.color_targets.iter().flatten() {
        colors.push(target_view(resources, target.slice, target.resource)?);
        color_inits.push(target.init);
    }
    let depth = match &pass.depth_stencil_target {
        Some(target) => Some((
            target_view(resources, target.slice, target.resource)?,
            target.init,
        )),
        None => None,
    };

    context.set_render_targets(&colors, depth.as_ref().map(|(view, _)| view))?;

    for (view, init) in colors.iter().zip(color_inits) {
        match init {
            ColorTargetInit::Load => {}
            ColorTargetInit::Discard => context.discard_target(view)?,
            ColorTargetInit::Clear(color) => context.clear_color_target(view, color)?,
        }
    }
    if let Some((view, init)) = &depth {
        match *init {
            DepthStencilInit::Load => {}
            DepthStencilInit::Discard => context.discard_target(view)?,
            DepthStencilInit::Clear { depth, stencil } => {
                context.clear_depth_stencil_target(view, depth, stencil)?
            }
        }
    }

    match pass.viewport {
        Some(viewport) => context.set_viewport(viewport),
        None => context.set_default_viewport(),
    }
    match pass.scissor_rect {
        Some(rect) => context.set_scissor_rect(rect),
        None => context.set_default_scissor_rect(),
    }
    context.set_depth_bias(pass.depth_bias.unwrap_or_default());
    context.set_wireframe(pass.wireframe);
    Ok(())
}

fn bind_variables(context: &mut CommandContext, resources: &ResourceManager, variables: &[usize]) {
    for &resource in variables {
        let Some(id) = resources.property_id(resource) else {
            continue;
        };
        if let Some(texture) = resources.texture_at(resource) {
            context.set_global_texture(id, texture);
        } else if let Some(buffer) = resources.buffer_at(resource) {
            context.set_global_buffer(id, buffer);
        } else {
            log::warn!(
                "Variable '{}' is not allocated and stays unbound",
                resources.name(resource)
            );
        }
    }
}

fn unbind_variables(context: &mut CommandContext, resources: &ResourceManager, variables: &[usize]) {
    for &resource in variables {
        let Some(id) = resources.property_id(resource) else {
            continue;
        };
        if resources.is_texture(resource) {
            context.unset_global_texture(id);
        } else {
            context.unset_global_buffer(id);
        }
    }
}
