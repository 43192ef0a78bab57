use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::DVec3;
use meshbridge::generate::{regular, sample, scattered};
use meshbridge::{Bounds, Field, GridTransformer, NeighborParams, SpatialIndex};

fn domain() -> Bounds {
    Bounds::from_min_max(DVec3::ZERO, DVec3::new(200.0, 100.0, 0.0))
}

fn setup(source_count: usize) -> GridTransformer {
    let mut source = scattered(&domain(), source_count, 42);
    sample(&mut source, &Field::PorePressure, |[x, y, _]| x.sin() * y);

    let mut transformer = GridTransformer::new();
    transformer.add_grid(source, "fea").ok();
    transformer.add_grid(regular(&domain(), 100, 50, 1), "tool").ok();
    transformer
}

fn bench_index_build(c: &mut Criterion) {
    let grid = scattered(&domain(), 10_000, 7);

    c.bench_function("index_build_10k", |b| {
        b.iter(|| black_box(SpatialIndex::build(&grid).ok()))
    });
}

fn bench_find_nearest_neighbors(c: &mut Criterion) {
    let mut transformer = setup(10_000);
    let params = NeighborParams::new(4);

    c.bench_function("find_nearest_neighbors_10k_to_5k", |b| {
        b.iter(|| {
            black_box(transformer.find_nearest_neighbors("fea", "tool", &params).ok());
        })
    });
}

fn bench_transition(c: &mut Criterion) {
    // Discovery once, transfer many times
    let mut transformer = setup(10_000);
    transformer
        .find_nearest_neighbors("fea", "tool", &NeighborParams::new(4))
        .ok();

    c.bench_function("transition_5k", |b| {
        b.iter(|| {
            black_box(transformer.transition("fea", &Field::PorePressure, "tool").ok());
        })
    });
}

criterion_group!(benches, bench_index_build, bench_find_nearest_neighbors, bench_transition);
criterion_main!(benches);
