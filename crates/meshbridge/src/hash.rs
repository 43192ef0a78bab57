//! Grid hashing.
//!
//! Deterministic 64-bit digests of grid contents. The geometry fingerprint
//! covers node numbers and coordinates only; it is recorded in every neighbor
//! map so a map built against a different geometry can be detected. The state
//! hash additionally covers all field values.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::grid::Grid;
use crate::node::Node;

/// Hash node numbers and coordinates of a grid.
///
/// Grids with the same nodes at the same positions produce the same
/// fingerprint regardless of their field values.
#[must_use]
pub fn geometry_fingerprint(grid: &Grid) -> u64 {
    let mut hasher = DefaultHasher::new();
    grid.len().hash(&mut hasher);
    for node in grid {
        hash_geometry(node, &mut hasher);
    }
    hasher.finish()
}

/// Hash the complete state of a grid: geometry plus every field value.
#[must_use]
pub fn state_hash(grid: &Grid) -> u64 {
    let mut hasher = DefaultHasher::new();
    grid.len().hash(&mut hasher);
    for node in grid {
        hash_geometry(node, &mut hasher);

        node.values().len().hash(&mut hasher);
        for (field, value) in node.values() {
            field.hash(&mut hasher);
            // Hash as bits to avoid float comparison issues
            value.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

fn hash_geometry<H: Hasher>(node: &Node, hasher: &mut H) {
    node.number().hash(hasher);
    for coordinate in node.coordinates() {
        coordinate.to_bits().hash(hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::grid::Origin;
    use crate::node::NodeId;

    fn grid() -> Grid {
        let mut grid = Grid::new();
        grid.add_node(NodeId(1), 0.0, 0.0, None, None).unwrap();
        grid.add_node(NodeId(2), 1.0, 2.0, Some(3.0), None).unwrap();
        grid
    }

    #[test]
    fn test_identical_grids_hash_equal() {
        assert_eq!(geometry_fingerprint(&grid()), geometry_fingerprint(&grid()));
        assert_eq!(state_hash(&grid()), state_hash(&grid()));
    }

    #[test]
    fn test_values_change_state_but_not_geometry() {
        let before = grid();
        let mut after = grid();
        after
            .set_node_values(&Field::Porosity, [(NodeId(1), 0.25)])
            .unwrap();

        assert_eq!(geometry_fingerprint(&before), geometry_fingerprint(&after));
        assert_ne!(state_hash(&before), state_hash(&after));
    }

    #[test]
    fn test_rotation_changes_geometry() {
        let before = grid();
        let mut after = grid();
        after.rotate(90.0, Origin::new(0.0, 0.0)).unwrap();

        assert_ne!(geometry_fingerprint(&before), geometry_fingerprint(&after));
    }

    #[test]
    fn test_node_numbers_are_part_of_geometry() {
        let mut a = Grid::new();
        a.add_node(NodeId(1), 0.0, 0.0, None, None).unwrap();
        let mut b = Grid::new();
        b.add_node(NodeId(2), 0.0, 0.0, None, None).unwrap();

        assert_ne!(geometry_fingerprint(&a), geometry_fingerprint(&b));
    }
}
