//! Benchmarks for whole-world stepping.
//!
//! Run with: cargo bench -p riposte-core

#![allow(missing_docs)]

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use nalgebra::{Point3, Vector3};
use riposte_contact::ContactParams;
use riposte_core::{World, WorldConfig};
use riposte_types::BodyDesc;

const DT: f64 = 1.0 / 60.0;

/// A cloud of separated spheres falling through the arena: exercises
/// integration, octree re-homing, and the contact walk with almost no
/// contacts to resolve.
fn falling_cloud(count: usize) -> World {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    let side = (count as f64).cbrt().ceil() as i64;
    let mut placed = 0;
    'fill: for x in 0..side {
        for y in 0..side {
            for z in 0..side {
                if placed == count {
                    break 'fill;
                }
                let position = Point3::new(
                    -20.0 + 3.0 * x as f64,
                    10.0 + 3.0 * y as f64,
                    -20.0 + 3.0 * z as f64,
                );
                world
                    .add_sphere(0.5, BodyDesc::new(1.0).with_position(position))
                    .expect("valid sphere");
                placed += 1;
            }
        }
    }
    world
}

/// A sheet of spheres resting on the floor: every tick regenerates and
/// resolves one contact per sphere.
fn resting_layer(count: usize) -> World {
    let config = WorldConfig {
        contacts: ContactParams::rigid(),
        ..WorldConfig::default()
    };
    let mut world = World::new(config).expect("valid config");
    world
        .add_plane(Vector3::new(0.0, 1.0, 0.0), 0.0)
        .expect("valid plane");
    let side = (count as f64).sqrt().ceil() as i64;
    let mut placed = 0;
    'fill: for x in 0..side {
        for z in 0..side {
            if placed == count {
                break 'fill;
            }
            let position = Point3::new(
                -(side as f64) + 2.0 * x as f64,
                0.95,
                -(side as f64) + 2.0 * z as f64,
            );
            world
                .add_sphere(1.0, BodyDesc::new(1.0).with_position(position))
                .expect("valid sphere");
            placed += 1;
        }
    }
    // Settle first so the measurement sees steady-state resting contacts.
    for _ in 0..30 {
        world.step(DT).expect("settling step");
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &count in &[64usize, 256] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("falling_cloud", count),
            &count,
            |b, &count| {
                b.iter_batched_ref(
                    || falling_cloud(count),
                    |world| black_box(world.step(DT).expect("step")),
                    BatchSize::SmallInput,
                );
            },
        );
        group.bench_with_input(
            BenchmarkId::new("resting_layer", count),
            &count,
            |b, &count| {
                b.iter_batched_ref(
                    || resting_layer(count),
                    |world| black_box(world.step(DT).expect("step")),
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_world_step);
criterion_main!(benches);
