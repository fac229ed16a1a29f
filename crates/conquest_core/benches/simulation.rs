//! Simulation benchmarks for conquest_core.
//!
//! Run with: `cargo bench -p conquest_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use std::collections::HashSet;

use conquest_core::math::GridPos;
use conquest_core::pathfinding::{find_path, NavGrid};
use conquest_core::spatial::SpatialHash;
use conquest_core::simulation::Command;
use conquest_test_utils::fixtures::{pos, Battlefield};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn pathfinding_benchmark(c: &mut Criterion) {
    let grid = NavGrid::new(40);
    // A wall with a single gap near the bottom.
    let blocked: HashSet<GridPos> = (0..39).map(|y| pos(20, y)).collect();

    c.bench_function("find_path/open_40x40", |b| {
        b.iter(|| find_path(&grid, black_box(pos(0, 0)), black_box(pos(39, 39)), &HashSet::new(), None));
    });
    c.bench_function("find_path/walled_40x40", |b| {
        b.iter(|| find_path(&grid, black_box(pos(0, 0)), black_box(pos(39, 0)), &blocked, None));
    });
}

fn spatial_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_query");
    for count in [100_u64, 1000] {
        let mut hash = SpatialHash::new(4);
        for id in 0..count {
            let n = id as i32;
            hash.add(id, pos((n * 7) % 40, (n * 13) % 40));
        }
        group.bench_with_input(BenchmarkId::from_parameter(count), &hash, |b, hash| {
            b.iter(|| hash.query_radius(black_box(pos(20, 20)), black_box(3)));
        });
    }
    group.finish();
}

fn tick_benchmark(c: &mut Criterion) {
    let mut field = Battlefield::skirmish();
    for id in [1, 3, 5, 7] {
        field.sim.enqueue(Command::Move {
            unit_id: id,
            target: pos(14 + (id as i32 - 1), 21),
            valid_mask: None,
        });
    }

    c.bench_function("skirmish/100_ticks", |b| {
        b.iter(|| {
            let mut run = field.clone();
            run.run(100);
            black_box(run.sim.state_hash())
        });
    });
}

criterion_group!(benches, pathfinding_benchmark, spatial_benchmark, tick_benchmark);
criterion_main!(benches);
