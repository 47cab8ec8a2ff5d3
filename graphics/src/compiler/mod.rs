//! Render graph compilation.
//!
//! Turns the declared passes of a [`RenderGraph`](crate::graph::RenderGraph)
//! into an executable schedule, in place on the pass records:
//!
//! 1. **Culling** - a backward scan drops passes whose output nobody uses
//! 2. **Async compute** - eligible passes move to the async compute queue
//!    when they can overlap direct work without a data hazard
//! 3. **Batching** - consecutive async passes share one context and one
//!    sync point
//! 4. **Lifetimes** - every resource gets a pass it is born before and a
//!    pass it dies after
//!
//! Passes keep their submission order; the compiler never reorders work.

use std::collections::BTreeSet;

use ember_core::profile_function;

use crate::graph::{GraphSettings, Pass, ResourceManager};

/// Schedule-wide results of a compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CompiledSchedule {
    /// Async pass the direct queue waits on at the end of the frame.
    pub(crate) fallback_wait: Option<usize>,
}

/// Compile `passes` against `resources`.
///
/// Writes the derived fields of every pass and the lifetime range of every
/// resource. Each pass must be fresh; compiling a pass twice panics.
pub(crate) fn compile(
    passes: &mut [Pass],
    resources: &mut ResourceManager,
    settings: &GraphSettings,
) -> CompiledSchedule {
    profile_function!();

    let mut schedule = CompiledSchedule::default();
    cull_and_schedule(passes, resources, settings, &mut schedule);
    batch_async_passes(passes, resources, &mut schedule);
    finalize_lifetimes(passes, resources);

    log::debug!(
        "Compiled render graph: {} passes, {} culled, {} async",
        passes.len(),
        passes.iter().filter(|p| p.is_culled).count(),
        passes.iter().filter(|p| p.is_async_compute).count()
    );
    schedule
}

/// Backward scan: cull, keep resources alive, pick async passes.
///
/// Async passes share one deadline that starts past the last pass and only
/// moves earlier as the scan proceeds.
fn cull_and_schedule(
    passes: &mut [Pass],
    resources: &mut ResourceManager,
    settings: &GraphSettings,
    schedule: &mut CompiledSchedule,
) {
    let mut deadline = passes.len();

    for index in (0..passes.len()).rev() {
        assert!(
            !passes[index].is_visited,
            "pass '{}' visited twice",
            passes[index].name
        );
        passes[index].is_visited = true;

        let has_surviving_successor = passes[index]
            .next_pass_indices
            .iter()
            .any(|&next| !passes[next].is_culled);
        let pass = &passes[index];
        if !has_surviving_successor && !pass.has_side_effects && pass.allow_culling {
            log::trace!("Culling pass '{}'", pass.name);
            passes[index].is_culled = true;
            continue;
        }

        for resource in passes[index].touched_resources() {
            resources.set_alive(resource, index);
        }

        let pass = &passes[index];
        if !pass.enable_async_compute {
            continue;
        }
        if !settings.async_compute {
            log::trace!("Async compute disabled; '{}' stays direct", pass.name);
        } else if pass.has_render_targets() {
            log::error!(
                "Pass '{}' has render targets and can not run on the async compute queue",
                pass.name
            );
        } else {
            try_schedule_async(passes, resources, index, &mut deadline, schedule);
        }
    }
}

/// Move `index` to the async queue if it overlaps direct work safely.
///
/// Only passes before `deadline` are checked. A hazard pulls `deadline` back
/// to the last direct pass at or before the conflicting pass, even when
/// `index` ends up staying direct.
fn try_schedule_async(
    passes: &mut [Pass],
    resources: &mut ResourceManager,
    index: usize,
    deadline: &mut usize,
    schedule: &mut CompiledSchedule,
) {
    let count = passes.len();

    let conflict = (index + 1..*deadline).find(|&next| {
        !passes[next].is_culled && has_hazard(&passes[index], &passes[next], resources)
    });
    if let Some(next) = conflict {
        match (index + 1..=next)
            .rev()
            .find(|&k| !passes[k].is_culled && !passes[k].is_async_compute)
        {
            Some(direct) => *deadline = direct,
            None => {
                log::trace!(
                    "'{}' conflicts with async pass '{}' and no direct pass separates them",
                    passes[index].name,
                    passes[next].name
                );
                *deadline = index;
                return;
            }
        }
    }

    let overlap = (index + 1..*deadline)
        .filter(|&k| !passes[k].is_culled && !passes[k].is_async_compute)
        .count();
    if overlap == 0 {
        log::trace!("'{}' overlaps no direct work; staying direct", passes[index].name);
        return;
    }

    passes[index].is_async_compute = true;
    for resource in passes[index].touched_resources() {
        resources.set_alive(resource, *deadline - 1);
    }
    if *deadline < count {
        passes[*deadline].pass_index_to_wait.get_or_insert(index);
    } else {
        schedule.fallback_wait.get_or_insert(index);
    }
    log::trace!(
        "'{}' runs async until '{}', overlapping {overlap} passes",
        passes[index].name,
        passes.get(*deadline).map_or("end of frame", |p| p.name.as_str())
    );
}

/// Whether `a` and `b` touch a resource in a way that needs ordering.
fn has_hazard(a: &Pass, b: &Pass, resources: &ResourceManager) -> bool {
    a.touched_resources().into_iter().any(|resource| {
        let (a_reads, a_writes) = (a.reads(resource), a.writes(resource));
        let (b_reads, b_writes) = (b.reads(resource), b.writes(resource));
        if a_writes && (b_reads || b_writes) || a_reads && b_writes {
            return true;
        }
        a_reads && b_reads && !resources.is_generically_readable(resource)
    })
}

/// Forward scan: group consecutive async passes into runs.
fn batch_async_passes(
    passes: &mut [Pass],
    resources: &mut ResourceManager,
    schedule: &mut CompiledSchedule,
) {
    let count = passes.len();
    let mut run_last = vec![None; count];
    let mut run: Vec<usize> = Vec::new();

    let surviving: Vec<usize> = (0..count).filter(|&i| !passes[i].is_culled).collect();
    for &index in &surviving {
        if !passes[index].is_async_compute {
            close_run(passes, &mut run, &mut run_last);
            continue;
        }
        if let Some(&first) = run.first() {
            passes[index].is_batched_with_previous = true;
            for resource in passes[index].touched_resources() {
                resources.set_alive(resource, first);
            }
        }
        run.push(index);
    }
    close_run(passes, &mut run, &mut run_last);

    for &index in &surviving {
        if let Some(wait) = passes[index].pass_index_to_wait {
            passes[index].pass_index_to_wait = run_last[wait].or(Some(wait));
        }
    }
    if let Some(wait) = schedule.fallback_wait {
        schedule.fallback_wait = run_last[wait].or(Some(wait));
    }
}

fn close_run(passes: &mut [Pass], run: &mut Vec<usize>, run_last: &mut [Option<usize>]) {
    let Some(&last) = run.last() else {
        return;
    };
    passes[last].need_sync_point = true;
    for &member in run.iter() {
        run_last[member] = Some(last);
    }
    run.clear();
}

/// Clamp every lifetime to surviving passes and record births and deaths.
fn finalize_lifetimes(passes: &mut [Pass], resources: &ResourceManager) {
    let surviving: Vec<usize> = (0..passes.len()).filter(|&i| !passes[i].is_culled).collect();

    for resource in 0..resources.len() {
        let Some((first, last)) = resources.lifetime(resource) else {
            continue;
        };
        let born = surviving.iter().copied().find(|&p| p >= first);
        let dead = surviving.iter().rev().copied().find(|&p| p <= last);
        if let (Some(born), Some(dead)) = (born, dead) {
            if born <= dead {
                passes[born].resources_born.push(resource);
                passes[dead].resources_dead.push(resource);
            }
        }
    }
}

/// Surviving passes in submission order.
pub(crate) fn surviving_passes(passes: &[Pass]) -> BTreeSet<usize> {
    (0..passes.len()).filter(|&i| !passes[i].is_culled).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::{BufferHandle, PassBuilder, TextureHandle};
    use crate::resources::Texture;
    use crate::types::{BufferDescriptor, BufferUsage, PropertyId, TextureDescriptor, TextureFormat};

    struct Fixture {
        passes: Vec<Pass>,
        resources: ResourceManager,
        settings: GraphSettings,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                passes: Vec::new(),
                resources: ResourceManager::default(),
                settings: GraphSettings::default(),
            }
        }

        fn texture(&mut self, id: i32) -> TextureHandle {
            self.resources.create_texture(
                PropertyId(id),
                TextureDescriptor::new_2d(16, 16, TextureFormat::Rgba16Float),
            )
        }

        fn buffer(&mut self, id: i32) -> BufferHandle {
            self.resources.create_buffer(
                PropertyId(id),
                BufferDescriptor::new(4, 64, BufferUsage::RW_STRUCTURED),
            )
        }

        fn backbuffer(&mut self) -> TextureHandle {
            self.resources.import_texture(
                PropertyId(100),
                Arc::new(Texture::new(
                    "Backbuffer",
                    TextureDescriptor::new_2d(16, 16, TextureFormat::Bgra8Unorm),
                )),
            )
        }

        fn pass(&mut self, name: &str) -> PassBuilder<'_> {
            PassBuilder::new(&mut self.passes, &mut self.resources, name)
        }

        fn compile(&mut self) -> CompiledSchedule {
            compile(&mut self.passes, &mut self.resources, &self.settings)
        }

        fn culled(&self) -> Vec<bool> {
            self.passes.iter().map(|p| p.is_culled).collect()
        }

        fn async_flags(&self) -> Vec<bool> {
            self.passes.iter().map(|p| p.is_async_compute).collect()
        }
    }

    #[test]
    fn test_unused_pass_culled() {
        let mut f = Fixture::new();
        let scratch = f.texture(1);
        f.pass("Unused").write(scratch);
        f.compile();
        assert_eq!(f.culled(), vec![true]);
        assert!(f.passes[0].resources_born.is_empty());
    }

    #[test]
    fn test_chain_kept_by_side_effect() {
        let mut f = Fixture::new();
        let gbuffer = f.texture(1);
        let unused = f.texture(2);
        let backbuffer = f.backbuffer();

        f.pass("Gbuffer").write(gbuffer);
        f.pass("Debug").read(gbuffer).write(unused);
        f.pass("Lighting")
            .read(gbuffer)
            .set_color_target(backbuffer, 0, crate::graph::ColorTargetInit::Discard);
        f.compile();

        assert_eq!(f.culled(), vec![false, true, false]);
        assert!(f.passes.iter().all(|p| p.is_visited));
    }

    #[test]
    fn test_allow_culling_false_keeps_pass() {
        let mut f = Fixture::new();
        let scratch = f.texture(1);
        f.pass("Capture").write(scratch).allow_culling(false);
        f.compile();
        assert_eq!(f.culled(), vec![false]);
        assert_eq!(f.passes[0].resources_born, vec![0]);
        assert_eq!(f.passes[0].resources_dead, vec![0]);
    }

    #[test]
    fn test_lifetimes_span_producer_to_last_reader() {
        let mut f = Fixture::new();
        let a = f.texture(1);
        let b = f.texture(2);
        let backbuffer = f.backbuffer();

        f.pass("P0").write(a);
        f.pass("P1").read(a).write(b);
        f.pass("P2").read(b).read(a).write(backbuffer);
        f.compile();

        assert_eq!(f.passes[0].resources_born, vec![0]);
        assert_eq!(f.passes[1].resources_born, vec![1]);
        assert_eq!(f.passes[2].resources_dead, vec![0, 1, 2]);
    }

    #[test]
    fn test_async_pass_waited_on_by_first_conflict() {
        let mut f = Fixture::new();
        let tex_a = f.texture(1);
        let backbuffer = f.backbuffer();

        f.pass("A").write(tex_a).enable_async_compute(true);
        f.pass("C").write(backbuffer);
        f.pass("B").read(tex_a).allow_culling(false);
        let schedule = f.compile();

        assert_eq!(f.async_flags(), vec![true, false, false]);
        assert_eq!(f.passes[2].pass_index_to_wait, Some(0));
        assert!(f.passes[0].need_sync_point);
        assert_eq!(schedule.fallback_wait, None);
    }

    #[test]
    fn test_zero_overlap_stays_direct() {
        let mut f = Fixture::new();
        let tex_a = f.texture(1);
        let backbuffer = f.backbuffer();

        f.pass("A").write(tex_a).enable_async_compute(true);
        f.pass("B").read(tex_a).write(backbuffer);
        let schedule = f.compile();

        assert_eq!(f.async_flags(), vec![false, false]);
        assert_eq!(f.passes[1].pass_index_to_wait, None);
        assert_eq!(schedule.fallback_wait, None);
    }

    #[test]
    fn test_deadline_shared_across_async_passes() {
        let mut f = Fixture::new();
        let x = f.buffer(1);
        let y = f.buffer(2);
        let backbuffer = f.backbuffer();

        f.pass("A1").write(x).enable_async_compute(true);
        f.pass("D1").write(backbuffer);
        f.pass("A2").write(y).enable_async_compute(true);
        f.pass("D2").read(y).allow_culling(false);
        f.pass("D3").read(x).allow_culling(false);
        let schedule = f.compile();

        // A2 has nothing to overlap with but still pulls the deadline to D2.
        assert_eq!(f.async_flags(), vec![true, false, false, false, false]);
        let waits: Vec<_> = f.passes.iter().map(|p| p.pass_index_to_wait).collect();
        assert_eq!(waits, vec![None, None, None, Some(0), None]);
        assert_eq!(schedule.fallback_wait, None);
        assert!(f.passes[0].need_sync_point);
        assert!(f.passes[4].resources_dead.contains(&0));
    }

    #[test]
    fn test_conflict_between_adjacent_async_passes_keeps_earlier_direct() {
        let mut f = Fixture::new();
        let x = f.buffer(1);
        let y = f.buffer(2);
        let backbuffer = f.backbuffer();

        f.pass("Seed").write(x).enable_async_compute(true);
        f.pass("Spread").read(x).write(y).enable_async_compute(true);
        f.pass("Shadow").write(backbuffer);
        f.pass("Draw").read(y).write(backbuffer);
        f.compile();

        assert_eq!(f.async_flags(), vec![false, true, false, false]);
        assert_eq!(f.passes[3].pass_index_to_wait, Some(1));
    }

    #[test]
    fn test_async_without_conflict_uses_fallback() {
        let mut f = Fixture::new();
        let data = f.buffer(1);
        let backbuffer = f.backbuffer();

        f.pass("Simulate")
            .write(data)
            .allow_culling(false)
            .enable_async_compute(true);
        f.pass("Draw").write(backbuffer);
        let schedule = f.compile();

        assert_eq!(f.async_flags(), vec![true, false]);
        assert_eq!(schedule.fallback_wait, Some(0));
        // Kept alive until the last pass of the frame.
        assert_eq!(f.passes[1].resources_dead, vec![0, 1]);
    }

    #[test]
    fn test_async_disabled_by_settings() {
        let mut f = Fixture::new();
        f.settings = GraphSettings::new().with_async_compute(false);
        let data = f.buffer(1);
        let backbuffer = f.backbuffer();

        f.pass("Simulate")
            .write(data)
            .allow_culling(false)
            .enable_async_compute(true);
        f.pass("Draw").write(backbuffer);
        let schedule = f.compile();

        assert_eq!(f.async_flags(), vec![false, false]);
        assert_eq!(schedule.fallback_wait, None);
    }

    #[test]
    fn test_async_with_render_targets_stays_direct() {
        let mut f = Fixture::new();
        let backbuffer = f.backbuffer();
        let other = f.backbuffer();
        f.pass("Overlay")
            .set_color_target(backbuffer, 0, crate::graph::ColorTargetInit::Load)
            .enable_async_compute(true);
        f.pass("Present").write(other);
        f.compile();
        assert_eq!(f.async_flags(), vec![false, false]);
    }

    #[test]
    fn test_shared_reads_of_pooled_resource_overlap() {
        let mut f = Fixture::new();
        let input = f.texture(1);
        let blurred = f.buffer(2);
        let backbuffer = f.backbuffer();

        f.pass("Produce").write(input);
        f.pass("Blur")
            .read(input)
            .write(blurred)
            .enable_async_compute(true);
        f.pass("Tonemap").read(input).write(backbuffer);
        f.pass("Composite").read(blurred).write(backbuffer);
        f.compile();

        assert_eq!(f.async_flags(), vec![false, true, false, false]);
        assert_eq!(f.passes[3].pass_index_to_wait, Some(1));
    }

    #[test]
    fn test_consecutive_async_passes_batched() {
        let mut f = Fixture::new();
        let a = f.buffer(1);
        let b = f.buffer(2);
        let backbuffer = f.backbuffer();

        f.pass("SimA").write(a).enable_async_compute(true);
        f.pass("SimB").write(b).enable_async_compute(true);
        f.pass("Shadow").write(backbuffer);
        f.pass("Draw").read(a).read(b).write(backbuffer);
        f.compile();

        assert_eq!(f.async_flags(), vec![true, true, false, false]);
        assert!(f.passes[1].is_batched_with_previous);
        assert!(!f.passes[0].is_batched_with_previous);
        assert!(!f.passes[0].need_sync_point);
        assert!(f.passes[1].need_sync_point);
        // The wait recorded for SimA now targets the end of the run.
        assert_eq!(f.passes[3].pass_index_to_wait, Some(1));
        // SimB's output is born with the run.
        assert_eq!(f.passes[0].resources_born, vec![0, 1]);
    }

    #[test]
    fn test_culled_passes_do_not_break_runs() {
        let mut f = Fixture::new();
        let a = f.buffer(1);
        let b = f.buffer(2);
        let unused = f.buffer(3);
        let backbuffer = f.backbuffer();

        f.pass("SimA").write(a).enable_async_compute(true);
        f.pass("Dead").write(unused);
        f.pass("SimB").write(b).enable_async_compute(true);
        f.pass("Shadow").write(backbuffer);
        f.pass("Draw").read(a).read(b).write(backbuffer);
        f.compile();

        assert!(f.passes[1].is_culled);
        assert!(f.passes[2].is_batched_with_previous);
        assert_eq!(surviving_passes(&f.passes).len(), 4);
    }

    #[test]
    #[should_panic(expected = "visited twice")]
    fn test_compiling_twice_panics() {
        let mut f = Fixture::new();
        let backbuffer = f.backbuffer();
        f.pass("Draw").write(backbuffer);
        f.compile();
        f.compile();
    }
}
