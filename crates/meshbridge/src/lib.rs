//! # meshbridge
//!
//! Field transfer between unstructured simulation grids.
//!
//! Coupled simulations (a finite-element solver next to a grid-based tool)
//! discretize the same physical domain twice. meshbridge moves scalar fields
//! such as pore pressure, void ratio and porosity from one discretization to
//! the other:
//!
//! - **Grids**: node-number keyed point sets with open-ended field values
//! - **Neighbor discovery**: a k-d tree finds the k nearest source nodes for
//!   every target node, optionally bounded by a maximum distance
//! - **Cached maps**: discovery runs once per geometry and is reused for every
//!   field transfer afterwards
//! - **Inverse-distance weighting**: each target value is the IDW average of
//!   its neighbors; unresolvable nodes end up NaN instead of failing
//!
//! ## Quick Start
//!
//! ```rust
//! use meshbridge::{Field, Grid, GridTransformer, NeighborParams, NodeId};
//! use std::collections::BTreeMap;
//!
//! let mut fea = Grid::new();
//! fea.add_node(NodeId(1), 0.0, 0.0, None, Some(BTreeMap::from([(Field::PorePressure, 10.0)])))?;
//! fea.add_node(NodeId(2), 10.0, 0.0, None, Some(BTreeMap::from([(Field::PorePressure, 20.0)])))?;
//!
//! let mut tool = Grid::new();
//! tool.add_node(NodeId(1), 5.0, 0.0, None, None)?;
//!
//! let mut transformer = GridTransformer::new();
//! transformer.add_grid(fea, "fea")?;
//! transformer.add_grid(tool, "tool")?;
//! transformer.find_nearest_neighbors("fea", "tool", &NeighborParams::new(2))?;
//! transformer.transition("fea", &Field::PorePressure, "tool")?;
//!
//! let values = transformer.grid("tool")?.get_node_values(&Field::PorePressure);
//! assert_eq!(values[&NodeId(1)], 15.0);
//! # Ok::<(), meshbridge::TransformError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod field;
pub mod generate;
pub mod grid;
pub mod hash;
pub mod node;
pub mod randomize;
pub mod spatial;
pub mod stats;
pub mod transformer;

// Re-exports for convenience
pub use error::{GridError, RandomizeError, TransformError};
pub use field::Field;
pub use grid::{Grid, GridRecord, Origin};
pub use hash::{geometry_fingerprint, state_hash};
pub use node::{Node, NodeId};
pub use randomize::FieldRandomizer;
pub use spatial::{Neighbor, NeighborParams, Neighborhood, SpatialIndex};
pub use stats::ScalarStats;
pub use transformer::{
    GridId, GridTransformer, NeighborMap, NeighborStatistics, NeighborSummary, TransferSummary,
    ValidationReport,
};

use glam::DVec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    /// Minimum corner
    pub min: DVec3,
    /// Maximum corner
    pub max: DVec3,
}

impl Bounds {
    /// Create bounds from dimensions (centered at origin).
    #[must_use]
    pub fn new(width: f64, height: f64, depth: f64) -> Self {
        Self {
            min: DVec3::new(-width / 2.0, -height / 2.0, -depth / 2.0),
            max: DVec3::new(width / 2.0, height / 2.0, depth / 2.0),
        }
    }

    /// Create bounds from min/max corners.
    #[must_use]
    pub fn from_min_max(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Smallest bounds containing every point, `None` for no points.
    #[must_use]
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = DVec3>,
    {
        points.into_iter().fold(None, |acc, p| match acc {
            None => Some(Self::from_min_max(p, p)),
            Some(b) => Some(Self::from_min_max(b.min.min(p), b.max.max(p))),
        })
    }

    /// Get the center of the bounds.
    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the bounds.
    #[must_use]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Length of the space diagonal.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.size().length()
    }

    /// Check if a point is inside the bounds.
    #[must_use]
    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}
