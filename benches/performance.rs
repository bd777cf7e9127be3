// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hemifuse::morphology::{dilate, fill_holes, union, Connectivity, StructuringElement};
use hemifuse::raster::Rasterizer;
use hemifuse::{BinaryVoxelGrid, CancelToken, GridSpec, Primitive, TriangleMesh};
use nalgebra::{Point3, Vector3};

fn grid(n: usize) -> GridSpec {
    GridSpec::axis_aligned([n, n, n], Vector3::repeat(1.0), Point3::origin()).unwrap()
}

fn sphere(n: usize, offset: f64) -> TriangleMesh {
    let c = n as f64 / 2.0;
    Primitive::sphere(Point3::new(c + offset, c, c), n as f64 / 4.0, 48).to_mesh()
}

fn rasterized(n: usize, offset: f64) -> BinaryVoxelGrid {
    Rasterizer::new(&grid(n), 0.1)
        .rasterize(&sphere(n, offset), &CancelToken::new())
        .unwrap()
}

fn bench_rasterize(c: &mut Criterion) {
    let mut group = c.benchmark_group("rasterize");
    group.sample_size(20);

    for n in [64, 128] {
        let spec = grid(n);
        let mesh = sphere(n, 0.0);
        group.bench_with_input(BenchmarkId::new("sphere_48", n), &n, |b, _| {
            b.iter(|| {
                Rasterizer::new(&spec, 0.1)
                    .rasterize(black_box(&mesh), &CancelToken::new())
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_union(c: &mut Criterion) {
    let mut group = c.benchmark_group("union");

    let left = rasterized(128, -16.0);
    let right = rasterized(128, 16.0);
    group.bench_function("spheres_128", |b| {
        b.iter(|| union(black_box(&left), black_box(&right)).unwrap());
    });

    group.finish();
}

fn bench_dilate(c: &mut Criterion) {
    let mut group = c.benchmark_group("dilate");
    group.sample_size(20);

    let source = rasterized(96, 0.0);
    for radius in [1, 3, 6] {
        group.bench_with_input(BenchmarkId::new("ball", radius), &radius, |b, &radius| {
            b.iter(|| dilate(black_box(&source), radius, StructuringElement::Ball));
        });
    }
    group.bench_function("box/3", |b| {
        b.iter(|| dilate(black_box(&source), 3, StructuringElement::Box));
    });

    group.finish();
}

fn bench_fill_holes(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_holes");

    let source = rasterized(128, 0.0);
    for connectivity in [Connectivity::Face, Connectivity::Full] {
        group.bench_function(format!("{:?}", connectivity).to_lowercase(), |b| {
            b.iter(|| {
                let mut grid = source.clone();
                fill_holes(black_box(&mut grid), connectivity)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rasterize, bench_union, bench_dilate, bench_fill_holes);
criterion_main!(benches);
