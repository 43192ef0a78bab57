//! Nearest-neighbor search.
//!
//! A static k-d tree over one grid's coordinates answers "k nearest points,
//! optionally bounded by a maximum distance" for every node of another grid.
//! The tree is built per discovery call and never updated incrementally.

use std::collections::BTreeMap;

use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::grid::Grid;
use crate::node::NodeId;

/// Neighbor count used when none is configured.
pub const DEFAULT_NEIGHBOR_COUNT: usize = 10;

/// Parameters of a neighbor discovery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborParams {
    /// Number of nearest source nodes to collect per target node
    pub count: usize,
    /// Candidates farther away than this are discarded (non-finite: unbounded)
    #[serde(default)]
    pub distance_max: Option<f64>,
}

impl Default for NeighborParams {
    fn default() -> Self {
        Self {
            count: DEFAULT_NEIGHBOR_COUNT,
            distance_max: None,
        }
    }
}

impl NeighborParams {
    /// Unbounded search for `count` neighbors.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count,
            distance_max: None,
        }
    }

    /// Set the neighbor count.
    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the maximum neighbor distance.
    #[must_use]
    pub fn with_distance_max(mut self, distance_max: f64) -> Self {
        self.distance_max = Some(distance_max);
        self
    }

    /// The effective distance bound, if any.
    #[must_use]
    pub fn bound(&self) -> Option<f64> {
        self.distance_max.filter(|d| d.is_finite())
    }

    /// Reject parameters no search can satisfy.
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.count == 0 {
            return Err(TransformError::InvalidNeighborCount);
        }
        Ok(())
    }
}

/// One source node close to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Source node number
    pub node: NodeId,
    /// Euclidean distance to the target node
    pub distance: f64,
}

/// Neighbors found for one target node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Neighborhood {
    /// Neighbors ordered by ascending distance (never empty)
    Found(Vec<Neighbor>),
    /// No source node within the distance bound
    Lonely,
}

impl Neighborhood {
    /// Neighbors as a slice; empty for lonely nodes.
    #[must_use]
    pub fn neighbors(&self) -> &[Neighbor] {
        match self {
            Neighborhood::Found(neighbors) => neighbors,
            Neighborhood::Lonely => &[],
        }
    }

    /// Check if no neighbor survived the distance bound.
    #[must_use]
    pub fn is_lonely(&self) -> bool {
        matches!(self, Neighborhood::Lonely)
    }
}

/// k-d tree over the coordinates of one grid.
pub struct SpatialIndex {
    tree: KdTree<f64, usize, [f64; 3]>,
    /// Node numbers parallel to the indices stored in the tree
    nodes: Vec<NodeId>,
}

impl SpatialIndex {
    /// Build an index over all nodes of a grid.
    ///
    /// Fails on non-finite coordinates.
    pub fn build(grid: &Grid) -> Result<Self, TransformError> {
        let (nodes, coordinates) = grid.coordinate_table();

        let mut tree = KdTree::with_capacity(3, 64);
        for (i, point) in coordinates.into_iter().enumerate() {
            tree.add(point, i).map_err(|err| {
                TransformError::SpatialIndex(format!("node {}: {err:?}", nodes[i]))
            })?;
        }

        Ok(Self { tree, nodes })
    }

    /// Number of indexed nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the index holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find the neighbors of a single point.
    pub fn nearest(
        &self,
        point: &[f64; 3],
        params: &NeighborParams,
    ) -> Result<Neighborhood, TransformError> {
        let found = self
            .tree
            .nearest(point, params.count, &squared_euclidean)
            .map_err(|err| TransformError::SpatialIndex(format!("{err:?}")))?;

        let bound = params.bound();
        let neighbors: Vec<Neighbor> = found
            .into_iter()
            .map(|(squared, &index)| Neighbor {
                node: self.nodes[index],
                distance: squared.sqrt(),
            })
            .filter(|n| bound.map_or(true, |max| n.distance <= max))
            .collect();

        if neighbors.is_empty() {
            Ok(Neighborhood::Lonely)
        } else {
            Ok(Neighborhood::Found(neighbors))
        }
    }

    /// Find the neighbors of every node of `target`.
    pub fn query_grid(
        &self,
        target: &Grid,
        params: &NeighborParams,
    ) -> Result<BTreeMap<NodeId, Neighborhood>, TransformError> {
        params.validate()?;

        let (numbers, coordinates) = target.coordinate_table();
        numbers
            .into_iter()
            .zip(coordinates.iter())
            .map(|(number, point)| Ok((number, self.nearest(point, params)?)))
            .collect()
    }
}
