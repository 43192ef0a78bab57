//! Synthetic grids.
//!
//! Regular lattices and seeded point clouds stand in for solver meshes in
//! tests, benchmarks and demos. Node numbers start at 1.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::field::Field;
use crate::grid::Grid;
use crate::node::NodeId;
use crate::Bounds;

/// Regular `nx * ny * nz` lattice spanning `bounds`.
///
/// An axis with a single point sits at the bounds center. With `nz <= 1`
/// the grid is planar and nodes carry no z coordinate.
#[must_use]
pub fn regular(bounds: &Bounds, nx: usize, ny: usize, nz: usize) -> Grid {
    let planar = nz <= 1;
    let mut grid = Grid::new();
    let mut number = 1;

    for k in 0..nz.max(1) {
        let z = axis(bounds.min.z, bounds.max.z, k, nz);
        for j in 0..ny {
            let y = axis(bounds.min.y, bounds.max.y, j, ny);
            for i in 0..nx {
                let x = axis(bounds.min.x, bounds.max.x, i, nx);
                let z = if planar { None } else { Some(z) };
                push(&mut grid, &mut number, x, y, z);
            }
        }
    }
    grid
}

/// `count` uniformly scattered nodes inside `bounds`.
///
/// Bounds with zero depth give a planar grid.
#[must_use]
pub fn scattered(bounds: &Bounds, count: usize, seed: u64) -> Grid {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let planar = bounds.size().z <= 0.0;
    let mut grid = Grid::new();
    let mut number = 1;

    for _ in 0..count {
        let x = lerp(bounds.min.x, bounds.max.x, rng.gen());
        let y = lerp(bounds.min.y, bounds.max.y, rng.gen());
        let z = if planar {
            None
        } else {
            Some(lerp(bounds.min.z, bounds.max.z, rng.gen()))
        };
        push(&mut grid, &mut number, x, y, z);
    }
    grid
}

/// Paint `field` on every node with an analytic function of its coordinates.
pub fn sample<F>(grid: &mut Grid, field: &Field, f: F)
where
    F: Fn([f64; 3]) -> f64,
{
    for number in grid.node_numbers() {
        if let Some(node) = grid.node_mut(number) {
            let value = f(node.coordinates());
            node.set_value(field, value);
        }
    }
}

fn axis(min: f64, max: f64, index: usize, count: usize) -> f64 {
    if count <= 1 {
        return (min + max) / 2.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let t = index as f64 / (count - 1) as f64;
    lerp(min, max, t)
}

fn lerp(min: f64, max: f64, t: f64) -> f64 {
    min + (max - min) * t
}

fn push(grid: &mut Grid, number: &mut u64, x: f64, y: f64, z: Option<f64>) {
    let id = NodeId(*number);
    *number += 1;
    if let Err(err) = grid.add_node(id, x, y, z, None) {
        tracing::warn!(%err, "generated node skipped");
    }
}
