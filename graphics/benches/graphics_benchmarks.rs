use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ember_graphics::{
    BufferDescriptor, BufferUsage, CLEAR_BLACK, ColorTargetInit, CommandContext, DummyDevice,
    Pipeline, PipelineId, PropertyId, QueueType, RenderGraph, ShaderParameters, Texture,
    TextureDescriptor, TextureFormat, TextureView,
};

// ---------------------------------------------------------------------------
// Graph construction
// ---------------------------------------------------------------------------

/// Build a deferred-style frame: `chain` post-processing passes behind a
/// gbuffer, plus an async compute simulation feeding the lighting pass.
fn build_frame(graph: &mut RenderGraph, backbuffer: &Arc<Texture>, chain: usize) {
    let gbuffer = graph.create_texture(
        PropertyId(1),
        TextureDescriptor::new_2d(1920, 1080, TextureFormat::Rgba16Float),
    );
    let particles = graph.create_buffer(
        PropertyId(2),
        BufferDescriptor::new(16, 4096, BufferUsage::RW_STRUCTURED),
    );
    let output = graph.import_texture(PropertyId(3), backbuffer.clone());

    graph
        .add_pass("Gbuffer")
        .set_color_target(gbuffer, 0, ColorTargetInit::Clear(CLEAR_BLACK));
    graph
        .add_pass("Simulate")
        .write(particles)
        .enable_async_compute(true);

    let mut previous = gbuffer;
    for i in 0..chain {
        let next = graph.create_texture(
            PropertyId(100 + i as i32),
            TextureDescriptor::new_2d(1920, 1080, TextureFormat::Rgba16Float),
        );
        graph
            .add_pass(&format!("Post{i}"))
            .read(previous)
            .set_color_target(next, 0, ColorTargetInit::Discard);
        previous = next;
    }

    graph
        .add_pass("Lighting")
        .read(previous)
        .read(particles)
        .set_color_target(output, 0, ColorTargetInit::Load);
}

fn backbuffer() -> Arc<Texture> {
    Arc::new(Texture::new(
        "Backbuffer",
        TextureDescriptor::new_2d(1920, 1080, TextureFormat::Bgra8Unorm),
    ))
}

fn bench_graph_compile_small(c: &mut Criterion) {
    let target = backbuffer();
    c.bench_function("render_graph_compile_4_passes", |b| {
        let mut graph = RenderGraph::default();
        b.iter(|| {
            build_frame(&mut graph, &target, 1);
            black_box(graph.compile());
            graph.clear();
        });
    });
}

fn bench_graph_compile_large(c: &mut Criterion) {
    let target = backbuffer();
    c.bench_function("render_graph_compile_64_passes", |b| {
        let mut graph = RenderGraph::default();
        b.iter(|| {
            build_frame(&mut graph, &target, 61);
            black_box(graph.compile());
            graph.clear();
        });
    });
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

fn bench_graph_execute(c: &mut Criterion) {
    let target = backbuffer();
    let device = DummyDevice::new();
    c.bench_function("render_graph_execute_16_passes", |b| {
        let mut graph = RenderGraph::default();
        b.iter(|| {
            build_frame(&mut graph, &target, 13);
            graph.compile_and_execute(&device).unwrap();
            device.take_events();
        });
    });
}

// ---------------------------------------------------------------------------
// Command recording
// ---------------------------------------------------------------------------

fn bench_record_dispatches(c: &mut Criterion) {
    let pipeline = Pipeline::compute(PipelineId(1), "Cull").with_buffer(PropertyId(1), 0);
    let buffer = Arc::new(ember_graphics::Buffer::new(
        "Instances",
        BufferDescriptor::new(16, 1024, BufferUsage::STRUCTURED),
    ));
    let parameters = ShaderParameters::new().with_buffer(PropertyId(1), buffer);

    c.bench_function("command_context_1000_dispatches", |b| {
        b.iter(|| {
            let mut ctx = CommandContext::new(QueueType::Direct);
            for _ in 0..1000 {
                ctx.dispatch(&pipeline, &parameters, 64, 1, 1).unwrap();
            }
            black_box(ctx.commands().len());
        });
    });
}

fn bench_record_clears(c: &mut Criterion) {
    let views: Vec<TextureView> = (0..8)
        .map(|i| {
            TextureView::new(Arc::new(Texture::new(
                format!("Target{i}"),
                TextureDescriptor::new_2d(256, 256, TextureFormat::Rgba8Unorm),
            )))
        })
        .collect();

    c.bench_function("command_context_set_targets_and_clear", |b| {
        b.iter(|| {
            let mut ctx = CommandContext::new(QueueType::Direct);
            ctx.set_render_targets(&views, None).unwrap();
            for view in &views {
                ctx.clear_color_target(view, CLEAR_BLACK).unwrap();
            }
            black_box(ctx.commands().len());
        });
    });
}

criterion_group!(
    benches,
    bench_graph_compile_small,
    bench_graph_compile_large,
    bench_graph_execute,
    bench_record_dispatches,
    bench_record_clears,
);
criterion_main!(benches);
