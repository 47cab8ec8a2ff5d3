//! Compiled graph inspection.
//!
//! Tools such as graph viewers register a [`GraphListener`] on a
//! [`RenderGraph`](super::RenderGraph) and receive a [`CompiledGraphView`]
//! snapshot every time the graph compiles.

use super::pass::Pass;
use super::resource_manager::ResourceManager;

/// Compiled state of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPassView {
    /// Submission index.
    pub index: usize,
    /// Pass name.
    pub name: String,
    /// Dropped because nothing used its output.
    pub is_culled: bool,
    /// Scheduled on the async compute queue.
    pub is_async_compute: bool,
    /// Recorded into the same context as the previous async pass.
    pub is_batched_with_previous: bool,
    /// Submits and stores a sync point after recording.
    pub need_sync_point: bool,
    /// Pass whose sync point must be reached before this one starts.
    pub wait_pass: Option<usize>,
    /// Passes reading something this pass wrote.
    pub next_passes: Vec<usize>,
    /// Resources allocated right before this pass.
    pub resources_born: Vec<String>,
    /// Resources released right after this pass.
    pub resources_dead: Vec<String>,
}

/// Snapshot of a compiled graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledGraphView {
    /// Every declared pass in submission order, culled ones included.
    pub passes: Vec<CompiledPassView>,
    /// Pass the direct queue waits on at the end of the frame.
    pub fallback_wait: Option<usize>,
}

impl CompiledGraphView {
    pub(crate) fn build(
        passes: &[Pass],
        resources: &ResourceManager,
        fallback_wait: Option<usize>,
    ) -> Self {
        let names = |indices: &[usize]| -> Vec<String> {
            indices.iter().map(|&index| resources.name(index)).collect()
        };
        let passes = passes
            .iter()
            .enumerate()
            .map(|(index, pass)| CompiledPassView {
                index,
                name: pass.name.clone(),
                is_culled: pass.is_culled,
                is_async_compute: pass.is_async_compute,
                is_batched_with_previous: pass.is_batched_with_previous,
                need_sync_point: pass.need_sync_point,
                wait_pass: pass.pass_index_to_wait,
                next_passes: pass.next_pass_indices.iter().copied().collect(),
                resources_born: names(&pass.resources_born),
                resources_dead: names(&pass.resources_dead),
            })
            .collect();
        Self {
            passes,
            fallback_wait,
        }
    }

    /// First pass with the given name.
    pub fn pass(&self, name: &str) -> Option<&CompiledPassView> {
        self.passes.iter().find(|pass| pass.name == name)
    }

    /// Passes that survived culling.
    pub fn surviving(&self) -> impl Iterator<Item = &CompiledPassView> {
        self.passes.iter().filter(|pass| !pass.is_culled)
    }

    /// Names of the passes that survived culling, in order.
    pub fn surviving_names(&self) -> Vec<&str> {
        self.surviving().map(|pass| pass.name.as_str()).collect()
    }
}

/// Receives a snapshot of every compiled graph.
pub trait GraphListener {
    /// Called after compilation, before any pass is recorded.
    fn on_graph_compiled(&mut self, graph: &CompiledGraphView);
}

impl<F> GraphListener for F
where
    F: FnMut(&CompiledGraphView),
{
    fn on_graph_compiled(&mut self, graph: &CompiledGraphView) {
        self(graph)
    }
}
