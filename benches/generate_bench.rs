//! Benchmarks for the graph compilation and voxel generation pipeline.
//!
//! Measures:
//!   1. Per-voxel scalar evaluation (the hot loop) on the waves preset
//!   2. Interval range analysis of one block-sized box
//!   3. Full block generation at several block sizes, surface-crossing and
//!      pruned variants
//!   4. Graph compilation itself
//!
//! Run with:
//!   cargo bench --bench generate_bench
//!
//! Results are written to `target/criterion/` with HTML reports.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use voxelgraph::buffer::VoxelBuffer;
use voxelgraph::graph::{BlockRequest, GraphGenerator, NodeKind};
use voxelgraph::math::Vec3i;
use voxelgraph::provider::SimplexNoise;
use std::sync::Arc;

fn waves() -> GraphGenerator {
    let mut gen = GraphGenerator::new();
    gen.load_waves_preset();
    gen.compile().unwrap();
    gen
}

fn noise_terrain() -> GraphGenerator {
    // Y - fbm3d(x, y, z): a typical terrain density
    let mut gen = GraphGenerator::new();
    let x = gen.create_node(NodeKind::InputX);
    let y = gen.create_node(NodeKind::InputY);
    let z = gen.create_node(NodeKind::InputZ);
    let n = gen.create_node(NodeKind::Noise3D);
    let sub = gen.create_node(NodeKind::Subtract);
    let o = gen.create_node(NodeKind::OutputSdf);
    gen.set_param_noise(n, 0, Arc::new(SimplexNoise::fractal(1337, 0.01, 4, 2.0, 0.5)))
        .unwrap();
    gen.add_connection(x, 0, n, 0).unwrap();
    gen.add_connection(y, 0, n, 1).unwrap();
    gen.add_connection(z, 0, n, 2).unwrap();
    gen.add_connection(y, 0, sub, 0).unwrap();
    gen.add_connection(n, 0, sub, 1).unwrap();
    gen.add_connection(sub, 0, o, 0).unwrap();
    gen.compile().unwrap();
    gen
}

fn bench_single_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_eval");

    let waves = waves();
    let program = Arc::clone(waves.program());
    let mut scratch = program.new_scratch();
    group.bench_function("waves", |b| {
        b.iter(|| program.eval(&mut scratch, black_box(1.0), black_box(1.0), black_box(1.0)))
    });

    let terrain = noise_terrain();
    let program = Arc::clone(terrain.program());
    let mut scratch = program.new_scratch();
    group.bench_function("noise_terrain", |b| {
        b.iter(|| program.eval(&mut scratch, black_box(1.0), black_box(1.0), black_box(1.0)))
    });

    group.finish();
}

fn bench_analyze_range(c: &mut Criterion) {
    let gen = waves();
    let program = Arc::clone(gen.program());
    let mut scratch = program.new_scratch();
    c.bench_function("analyze_range/waves_16", |b| {
        b.iter(|| {
            program.analyze_range(
                &mut scratch,
                black_box((0.0, -8.0, 0.0)),
                black_box((16.0, 8.0, 16.0)),
            )
        })
    });
}

fn bench_generate_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_block");

    for size in [8, 16, 32] {
        let voxels = (size as u64).pow(3);
        group.throughput(Throughput::Elements(voxels));

        // Block crossing the surface: full per-voxel walk
        group.bench_with_input(BenchmarkId::new("waves_surface", size), &size, |b, &size| {
            let mut gen = waves();
            b.iter(|| {
                let mut buffer = VoxelBuffer::new(Vec3i::splat(size));
                gen.generate_block(BlockRequest {
                    buffer: &mut buffer,
                    origin_in_voxels: Vec3i::new(0, -size / 2, 0),
                    lod: 0,
                });
                buffer
            })
        });

        // Block far above the surface: pruned by range analysis
        group.bench_with_input(BenchmarkId::new("waves_pruned", size), &size, |b, &size| {
            let mut gen = waves();
            b.iter(|| {
                let mut buffer = VoxelBuffer::new(Vec3i::splat(size));
                gen.generate_block(BlockRequest {
                    buffer: &mut buffer,
                    origin_in_voxels: Vec3i::new(0, 1000, 0),
                    lod: 0,
                });
                buffer
            })
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut gen = GraphGenerator::new();
    gen.load_waves_preset();
    c.bench_function("compile/waves", |b| b.iter(|| gen.compile().unwrap()));
}

criterion_group!(
    benches,
    bench_single_eval,
    bench_analyze_range,
    bench_generate_block,
    bench_compile
);
criterion_main!(benches);
