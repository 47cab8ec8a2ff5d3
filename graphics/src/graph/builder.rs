//! Pass declaration.

use super::context::PassContext;
use super::pass::{
    ColorTarget, ColorTargetInit, DepthStencilInit, DepthStencilTarget, MAX_COLOR_TARGETS, Pass,
};
use super::resource::{PassResourceUsage, ResourceHandle, TextureSlice};
use super::resource_manager::ResourceManager;
use crate::error::GraphicsError;
use crate::types::{DepthBias, ScissorRect, Viewport};

/// Declares what one pass reads, writes and renders to.
///
/// Obtained from [`RenderGraph::add_pass`](super::RenderGraph::add_pass).
/// Reading a resource links the pass to the last pass that wrote it; a pass
/// nothing depends on is culled unless it writes an external resource or
/// opts out with [`allow_culling`](Self::allow_culling).
///
/// Modeling mistakes are logged and the offending call is ignored.
pub struct PassBuilder<'a> {
    passes: &'a mut Vec<Pass>,
    resources: &'a mut ResourceManager,
    index: usize,
}

impl<'a> PassBuilder<'a> {
    pub(crate) fn new(
        passes: &'a mut Vec<Pass>,
        resources: &'a mut ResourceManager,
        name: &str,
    ) -> Self {
        let index = passes.len();
        passes.push(Pass::new(name));
        Self {
            passes,
            resources,
            index,
        }
    }

    /// Submission index of the pass.
    pub fn index(&self) -> usize {
        self.index
    }

    fn pass(&mut self) -> &mut Pass {
        &mut self.passes[self.index]
    }

    /// Declare a read.
    pub fn read(&mut self, resource: impl Into<ResourceHandle>) -> &mut Self {
        if let Some(index) = self.resources.resolve(resource) {
            self.add_input(index, PassResourceUsage::VARIABLE);
        }
        self
    }

    /// Declare a write.
    pub fn write(&mut self, resource: impl Into<ResourceHandle>) -> &mut Self {
        if let Some(index) = self.resources.resolve(resource) {
            self.add_output(index, PassResourceUsage::VARIABLE);
        }
        self
    }

    /// Declare a read followed by a write.
    pub fn read_write(&mut self, resource: impl Into<ResourceHandle>) -> &mut Self {
        if let Some(index) = self.resources.resolve(resource) {
            self.add_input(index, PassResourceUsage::VARIABLE);
            self.add_output(index, PassResourceUsage::VARIABLE);
        }
        self
    }

    /// Bind a color target at `slot`.
    pub fn set_color_target(
        &mut self,
        slice: impl Into<TextureSlice>,
        slot: usize,
        init: ColorTargetInit,
    ) -> &mut Self {
        let slice = slice.into();
        if slot >= MAX_COLOR_TARGETS {
            log::error!(
                "Color target index {slot} exceeds the limit of {MAX_COLOR_TARGETS} in pass '{}'",
                self.passes[self.index].name
            );
            return self;
        }
        if self.passes[self.index].color_targets[slot].is_some() {
            log::error!(
                "Pass '{}' can not set color target multiple times (slot {slot})",
                self.passes[self.index].name
            );
            return self;
        }
        let Some(resource) = self.resources.resolve(slice.texture()) else {
            return self;
        };

        if init == ColorTargetInit::Load {
            self.add_input(resource, PassResourceUsage::RENDER_TARGET);
        }
        if self.add_output(resource, PassResourceUsage::RENDER_TARGET) {
            self.pass().color_targets[slot] = Some(ColorTarget {
                slice,
                resource,
                init,
            });
        }
        self
    }

    /// Bind the depth/stencil target.
    pub fn set_depth_stencil_target(
        &mut self,
        slice: impl Into<TextureSlice>,
        init: DepthStencilInit,
    ) -> &mut Self {
        let slice = slice.into();
        if self.passes[self.index].depth_stencil_target.is_some() {
            log::error!(
                "Pass '{}' can not set depth stencil target multiple times",
                self.passes[self.index].name
            );
            return self;
        }
        let Some(resource) = self.resources.resolve(slice.texture()) else {
            return self;
        };

        if init == DepthStencilInit::Load {
            self.add_input(resource, PassResourceUsage::RENDER_TARGET);
        }
        if self.add_output(resource, PassResourceUsage::RENDER_TARGET) {
            self.pass().depth_stencil_target = Some(DepthStencilTarget {
                slice,
                resource,
                init,
            });
        }
        self
    }

    /// Override the viewport derived from the first target.
    pub fn set_viewport(&mut self, viewport: Viewport) -> &mut Self {
        self.pass().viewport = Some(viewport);
        self
    }

    /// Set a scissor rectangle.
    pub fn set_scissor_rect(&mut self, rect: ScissorRect) -> &mut Self {
        self.pass().scissor_rect = Some(rect);
        self
    }

    /// Set the rasterizer depth bias.
    pub fn set_depth_bias(&mut self, bias: DepthBias) -> &mut Self {
        self.pass().depth_bias = Some(bias);
        self
    }

    /// Rasterize in wireframe.
    pub fn set_wireframe(&mut self, wireframe: bool) -> &mut Self {
        self.pass().wireframe = wireframe;
        self
    }

    /// Allow the compiler to drop the pass when nothing uses its output.
    pub fn allow_culling(&mut self, allow: bool) -> &mut Self {
        self.pass().allow_culling = allow;
        self
    }

    /// Let the pass run on the async compute queue when that is hazard-free.
    pub fn enable_async_compute(&mut self, enable: bool) -> &mut Self {
        self.pass().enable_async_compute = enable;
        self
    }

    /// Bind every read and written resource as a global shader variable
    /// under its property id while the callback runs.
    pub fn use_default_variables(&mut self, enable: bool) -> &mut Self {
        self.pass().use_default_variables = enable;
        self
    }

    /// Set the callback recording the pass.
    ///
    /// The callback runs at most once and never if the pass is culled.
    pub fn set_render_func(
        &mut self,
        func: impl FnOnce(&mut PassContext<'_>) -> Result<(), GraphicsError> + 'static,
    ) -> &mut Self {
        let pass = self.pass();
        if pass.render_func.is_some() {
            log::error!("Render function is already set in pass '{}'", pass.name);
            return self;
        }
        pass.render_func = Some(Box::new(func));
        self
    }

    fn add_input(&mut self, resource: usize, usage: PassResourceUsage) {
        let index = self.index;
        if let Some(existing) = self.passes[index].resources_in.get_mut(&resource) {
            *existing |= usage;
            return;
        }
        self.passes[index].resources_in.insert(resource, usage);

        match self.resources.last_producer_before(resource, index) {
            Some(producer) => {
                self.passes[producer].next_pass_indices.insert(index);
            }
            None => {
                if !self.resources.is_external(resource) {
                    log::warn!(
                        "Pass '{}' reads '{}' before any pass writes it",
                        self.passes[index].name,
                        self.resources.name(resource)
                    );
                }
            }
        }
    }

    /// Returns `false` if the write was refused.
    fn add_output(&mut self, resource: usize, usage: PassResourceUsage) -> bool {
        let index = self.index;
        if !self.resources.allow_gpu_writing(resource) {
            log::error!(
                "Pass '{}' can not write '{}': the resource is read-only on the GPU",
                self.passes[index].name,
                self.resources.name(resource)
            );
            return false;
        }
        if self.resources.is_external(resource) {
            self.passes[index].has_side_effects = true;
        }

        if let Some(existing) = self.passes[index].resources_out.get_mut(&resource) {
            *existing |= usage;
            return true;
        }
        self.passes[index].resources_out.insert(resource, usage);
        self.resources.add_producer(resource, index);
        true
    }
}
