//! Error types.
//!
//! Errors are reserved for caller sequencing bugs and malformed input. Data
//! quality problems (neighborless nodes, missing values) never surface here;
//! they end up as NaN values and `tracing` warnings instead.

use thiserror::Error;

use crate::field::Field;
use crate::node::NodeId;
use crate::transformer::GridId;

/// Errors raised by [`Grid`](crate::Grid) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// A node with this number is already part of the grid.
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),
    /// No node with this number is part of the grid.
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    /// A bulk-load record lacks a mandatory coordinate.
    #[error("record {index} is missing its {axis} coordinate")]
    MissingCoordinate {
        /// Position of the record in the input
        index: usize,
        /// Missing axis name
        axis: &'static str,
    },
    /// A bulk-load record has an unusable shape.
    #[error("record {index} is malformed: {reason}")]
    MalformedRecord {
        /// Position of the record in the input
        index: usize,
        /// What is wrong with it
        reason: String,
    },
    /// Rotation angle outside [0, 360] degrees.
    #[error("rotation angle {0} is outside [0, 360] degrees")]
    InvalidAngle(f64),
    /// Rotation origin lacks a required key.
    #[error("rotation origin is missing key {0}")]
    MissingOrigin(&'static str),
}

/// Errors raised by [`GridTransformer`](crate::GridTransformer) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// No grid is registered under this name.
    #[error("grid {0} not found")]
    UnknownGrid(GridId),
    /// `add_grid` on a name that is already registered.
    #[error("grid {0} already exists, use update_grid instead")]
    DuplicateGrid(GridId),
    /// `update_grid` on a name that is not registered.
    #[error("grid {0} does not exist, use add_grid instead")]
    GridNotRegistered(GridId),
    /// No node of the source grid carries the field.
    #[error("field {field} not found in grid {grid}")]
    FieldNotFound {
        /// Source grid
        grid: GridId,
        /// Requested field
        field: Field,
    },
    /// `transition` before `find_nearest_neighbors` for this pair.
    #[error("no neighbor map from {source_grid} to {target_grid}, find nearest neighbors first")]
    MissingNeighborMap {
        /// Grid the values come from
        source_grid: GridId,
        /// Grid the values go to
        target_grid: GridId,
    },
    /// Neighbor count of zero.
    #[error("neighbor count must be at least 1")]
    InvalidNeighborCount,
    /// Neighbor discovery against a grid without nodes.
    #[error("grid {0} has no nodes")]
    EmptyGrid(GridId),
    /// The spatial index rejected a point or query.
    #[error("spatial index error: {0}")]
    SpatialIndex(String),
    /// A grid operation failed.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Errors raised by the [`FieldRandomizer`](crate::randomize::FieldRandomizer).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RandomizeError {
    /// Statistics need at least two samples.
    #[error("at least two values are required, got {0}")]
    TooFewValues(usize),
    /// The coefficient of variation is undefined for a zero mean.
    #[error("dataset mean is zero, coefficient of variation is undefined")]
    ZeroMean,
}
