//! Grid node structure.
//!
//! A node is a point with a stable number and an open-ended set of field
//! values. Two-dimensional grids are stored as z = 0 planes.

use std::collections::BTreeMap;
use std::fmt;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::field::Field;

/// Node number, unique within one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Get the raw node number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(number: u64) -> Self {
        Self(number)
    }
}

/// A single grid node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    number: NodeId,
    position: DVec3,
    /// Whether a z coordinate was supplied (false for planar grids)
    has_z: bool,
    values: BTreeMap<Field, f64>,
}

impl Node {
    /// Create a node without values.
    #[must_use]
    pub fn new(number: NodeId, x: f64, y: f64, z: Option<f64>) -> Self {
        Self {
            number,
            position: DVec3::new(x, y, z.unwrap_or(0.0)),
            has_z: z.is_some(),
            values: BTreeMap::new(),
        }
    }

    /// Create a node carrying initial values.
    #[must_use]
    pub fn with_values(
        number: NodeId,
        x: f64,
        y: f64,
        z: Option<f64>,
        values: BTreeMap<Field, f64>,
    ) -> Self {
        Self {
            values,
            ..Self::new(number, x, y, z)
        }
    }

    /// Node number.
    #[must_use]
    pub fn number(&self) -> NodeId {
        self.number
    }

    /// Position; z reads as 0 when none was supplied.
    #[must_use]
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Coordinates as an `(x, y, z)` array.
    #[must_use]
    pub fn coordinates(&self) -> [f64; 3] {
        self.position.to_array()
    }

    /// The z coordinate as supplied at creation.
    #[must_use]
    pub fn z(&self) -> Option<f64> {
        self.has_z.then_some(self.position.z)
    }

    /// Get a field value.
    #[must_use]
    pub fn value(&self, field: &Field) -> Option<f64> {
        self.values.get(field).copied()
    }

    /// Check whether the node carries a field.
    #[must_use]
    pub fn has_value(&self, field: &Field) -> bool {
        self.values.contains_key(field)
    }

    /// Add a new or update an existing value.
    pub fn set_value(&mut self, field: &Field, value: f64) {
        match self.values.get_mut(field) {
            Some(slot) => {
                debug!(node = %self.number, %field, value, "value updated");
                *slot = value;
            }
            None => {
                debug!(node = %self.number, %field, value, "value added");
                self.values.insert(field.clone(), value);
            }
        }
    }

    /// Remove a value, returning it if present.
    pub fn remove_value(&mut self, field: &Field) -> Option<f64> {
        self.values.remove(field)
    }

    /// All values in field order.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<Field, f64> {
        &self.values
    }

    /// Rotate the in-plane position about `origin`.
    ///
    /// `rotation` is the unit vector `(cos θ, sin θ)`; z is untouched.
    pub(crate) fn rotate(&mut self, rotation: DVec2, origin: DVec2) {
        let relative = self.position.truncate() - origin;
        let rotated = origin + rotation.rotate(relative);
        self.position.x = rotated.x;
        self.position.y = rotated.y;
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node: no={}, coordinates=({}, {}, {}), values={}",
            self.number,
            self.position.x,
            self.position.y,
            self.position.z,
            self.values.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_node_reads_zero_z() {
        let node = Node::new(NodeId(1), 1.0, 2.0, None);
        assert_eq!(node.coordinates(), [1.0, 2.0, 0.0]);
        assert_eq!(node.z(), None);

        let node = Node::new(NodeId(2), 1.0, 2.0, Some(3.0));
        assert_eq!(node.z(), Some(3.0));
    }

    #[test]
    fn test_set_value_adds_then_updates() {
        let mut node = Node::new(NodeId(1), 0.0, 0.0, None);
        assert_eq!(node.value(&Field::PorePressure), None);

        node.set_value(&Field::PorePressure, 10.0);
        assert_eq!(node.value(&Field::PorePressure), Some(10.0));

        node.set_value(&Field::PorePressure, 12.5);
        assert_eq!(node.value(&Field::PorePressure), Some(12.5));
        assert_eq!(node.values().len(), 1);
    }

    #[test]
    fn test_rotate_quarter_turn_keeps_z() {
        let mut node = Node::new(NodeId(1), 2.0, 1.0, Some(5.0));
        node.rotate(DVec2::from_angle(std::f64::consts::FRAC_PI_2), DVec2::new(1.0, 1.0));

        let [x, y, z] = node.coordinates();
        assert!((x - 1.0).abs() < 1e-12);
        assert!((y - 2.0).abs() < 1e-12);
        assert_eq!(z, 5.0);
    }
}
