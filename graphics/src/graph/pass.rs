//! Render pass records.
//!
//! A [`Pass`] holds what a [`PassBuilder`](super::PassBuilder) declared plus
//! the schedule the compiler derives from it.

use std::collections::{BTreeMap, BTreeSet};

use super::context::PassContext;
use super::resource::{PassResourceUsage, TextureSlice};
use crate::device::SyncPoint;
use crate::error::GraphicsError;
use crate::types::{ClearColor, DepthBias, ScissorRect, Viewport};

/// Maximum number of simultaneously bound color targets.
pub const MAX_COLOR_TARGETS: usize = 8;

/// Callback recording the GPU work of a pass.
pub type RenderFunc = Box<dyn FnOnce(&mut PassContext<'_>) -> Result<(), GraphicsError>>;

/// How a color target is initialized when the pass starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorTargetInit {
    /// Keep the existing contents.
    Load,
    /// Contents are undefined.
    Discard,
    /// Clear to a color.
    Clear(ClearColor),
}

/// How a depth/stencil target is initialized when the pass starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthStencilInit {
    /// Keep the existing contents.
    Load,
    /// Contents are undefined.
    Discard,
    /// Clear depth and stencil.
    Clear {
        /// Depth clear value.
        depth: f32,
        /// Stencil clear value.
        stencil: u8,
    },
}

/// A bound color target.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColorTarget {
    pub(crate) slice: TextureSlice,
    pub(crate) resource: usize,
    pub(crate) init: ColorTargetInit,
}

/// The bound depth/stencil target.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DepthStencilTarget {
    pub(crate) slice: TextureSlice,
    pub(crate) resource: usize,
    pub(crate) init: DepthStencilInit,
}

/// A declared pass and its compiled schedule.
pub(crate) struct Pass {
    pub(crate) name: String,

    // Declaration
    pub(crate) resources_in: BTreeMap<usize, PassResourceUsage>,
    pub(crate) resources_out: BTreeMap<usize, PassResourceUsage>,
    pub(crate) color_targets: [Option<ColorTarget>; MAX_COLOR_TARGETS],
    pub(crate) depth_stencil_target: Option<DepthStencilTarget>,
    pub(crate) viewport: Option<Viewport>,
    pub(crate) scissor_rect: Option<ScissorRect>,
    pub(crate) depth_bias: Option<DepthBias>,
    pub(crate) wireframe: bool,
    pub(crate) allow_culling: bool,
    pub(crate) enable_async_compute: bool,
    pub(crate) use_default_variables: bool,
    pub(crate) has_side_effects: bool,
    pub(crate) render_func: Option<RenderFunc>,

    // Schedule
    pub(crate) next_pass_indices: BTreeSet<usize>,
    pub(crate) is_visited: bool,
    pub(crate) is_culled: bool,
    pub(crate) is_async_compute: bool,
    pub(crate) is_batched_with_previous: bool,
    pub(crate) need_sync_point: bool,
    pub(crate) pass_index_to_wait: Option<usize>,
    pub(crate) sync_point: Option<SyncPoint>,
    pub(crate) resources_born: Vec<usize>,
    pub(crate) resources_dead: Vec<usize>,
}

impl Pass {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources_in: BTreeMap::new(),
            resources_out: BTreeMap::new(),
            color_targets: [None; MAX_COLOR_TARGETS],
            depth_stencil_target: None,
            viewport: None,
            scissor_rect: None,
            depth_bias: None,
            wireframe: false,
            allow_culling: true,
            enable_async_compute: false,
            use_default_variables: true,
            has_side_effects: false,
            render_func: None,
            next_pass_indices: BTreeSet::new(),
            is_visited: false,
            is_culled: false,
            is_async_compute: false,
            is_batched_with_previous: false,
            need_sync_point: false,
            pass_index_to_wait: None,
            sync_point: None,
            resources_born: Vec::new(),
            resources_dead: Vec::new(),
        }
    }

    /// Forget everything a previous compilation derived.
    pub(crate) fn reset_schedule(&mut self) {
        self.is_visited = false;
        self.is_culled = false;
        self.is_async_compute = false;
        self.is_batched_with_previous = false;
        self.need_sync_point = false;
        self.pass_index_to_wait = None;
        self.sync_point = None;
        self.resources_born.clear();
        self.resources_dead.clear();
    }

    /// Whether any color or depth/stencil target is bound.
    pub(crate) fn has_render_targets(&self) -> bool {
        self.color_targets.iter().any(Option::is_some) || self.depth_stencil_target.is_some()
    }

    /// Every resource the pass reads or writes, each once, in index order.
    pub(crate) fn touched_resources(&self) -> BTreeSet<usize> {
        self.resources_in
            .keys()
            .chain(self.resources_out.keys())
            .copied()
            .collect()
    }

    pub(crate) fn reads(&self, resource: usize) -> bool {
        self.resources_in.contains_key(&resource)
    }

    pub(crate) fn writes(&self, resource: usize) -> bool {
        self.resources_out.contains_key(&resource)
    }

    /// Resources declared with [`PassResourceUsage::VARIABLE`].
    pub(crate) fn variables(&self) -> BTreeSet<usize> {
        self.resources_in
            .iter()
            .chain(self.resources_out.iter())
            .filter(|(_, usage)| usage.contains(PassResourceUsage::VARIABLE))
            .map(|(&index, _)| index)
            .collect()
    }
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("resources_in", &self.resources_in)
            .field("resources_out", &self.resources_out)
            .field("has_render_func", &self.render_func.is_some())
            .field("is_culled", &self.is_culled)
            .field("is_async_compute", &self.is_async_compute)
            .field("is_batched_with_previous", &self.is_batched_with_previous)
            .field("need_sync_point", &self.need_sync_point)
            .field("pass_index_to_wait", &self.pass_index_to_wait)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let pass = Pass::new("Opaque");
        assert!(pass.allow_culling);
        assert!(pass.use_default_variables);
        assert!(!pass.enable_async_compute);
        assert!(!pass.has_render_targets());
        assert!(pass.render_func.is_none());
    }

    #[test]
    fn test_touched_resources_deduplicated() {
        let mut pass = Pass::new("Blur");
        pass.resources_in.insert(2, PassResourceUsage::VARIABLE);
        pass.resources_out.insert(2, PassResourceUsage::VARIABLE);
        pass.resources_out.insert(0, PassResourceUsage::RENDER_TARGET);

        assert_eq!(pass.touched_resources().into_iter().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(pass.variables().into_iter().collect::<Vec<_>>(), vec![2]);
        assert!(pass.reads(2) && pass.writes(2) && !pass.reads(0));
    }
}
