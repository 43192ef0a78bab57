//! Grid storage.
//!
//! A grid is a set of nodes keyed by node number. Nodes are kept in a
//! `BTreeMap`, so every per-node listing (coordinates, node numbers, values)
//! comes out in the same ascending node-number order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::GridError;
use crate::field::Field;
use crate::node::{Node, NodeId};
use crate::stats::ScalarStats;
use crate::Bounds;

/// Field name used when a scalar record is loaded without an explicit field.
pub const DEFAULT_FIELD_NAME: &str = "value";

/// One input row for [`Grid::initiate_grid`].
///
/// Serialized with the key names the file readers produce
/// (`x_coordinate`, `y_coordinate`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridRecord {
    /// Explicit node number; the record index is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_number: Option<u64>,
    /// x coordinate (mandatory)
    #[serde(rename = "x_coordinate")]
    pub x: Option<f64>,
    /// y coordinate (mandatory)
    #[serde(rename = "y_coordinate")]
    pub y: Option<f64>,
    /// z coordinate (planar grids omit it)
    #[serde(rename = "z_coordinate", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Single scalar, stored under the field passed to `initiate_grid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Named values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<Field, f64>>,
}

impl GridRecord {
    /// Create a planar record without values.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    /// Set the z coordinate.
    #[must_use]
    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    /// Set an explicit node number.
    #[must_use]
    pub fn with_node_number(mut self, number: u64) -> Self {
        self.node_number = Some(number);
        self
    }

    /// Set a single scalar value.
    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Set named values.
    #[must_use]
    pub fn with_values(mut self, values: BTreeMap<Field, f64>) -> Self {
        self.values = Some(values);
        self
    }

    fn into_node(self, index: usize, field: &Field) -> Result<Node, GridError> {
        let x = self.x.ok_or(GridError::MissingCoordinate { index, axis: "x" })?;
        let y = self.y.ok_or(GridError::MissingCoordinate { index, axis: "y" })?;
        let number = NodeId(self.node_number.unwrap_or(index as u64));

        let values = match (self.value, self.values) {
            (Some(_), Some(_)) => {
                return Err(GridError::MalformedRecord {
                    index,
                    reason: "both value and values are set".into(),
                })
            }
            (Some(value), None) => BTreeMap::from([(field.clone(), value)]),
            (None, Some(values)) => values,
            (None, None) => BTreeMap::new(),
        };

        Ok(Node::with_values(number, x, y, self.z, values))
    }
}

/// Center of an in-plane rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    /// x coordinate
    #[serde(rename = "x_coordinate")]
    pub x: f64,
    /// y coordinate
    #[serde(rename = "y_coordinate")]
    pub y: f64,
}

impl Origin {
    /// Create an origin.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Build an origin from a name -> value map with `x_coordinate` and
    /// `y_coordinate` keys.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self, GridError> {
        let x = map
            .get("x_coordinate")
            .ok_or(GridError::MissingOrigin("x_coordinate"))?;
        let y = map
            .get("y_coordinate")
            .ok_or(GridError::MissingOrigin("y_coordinate"))?;
        Ok(Self::new(*x, *y))
    }
}

/// A collection of nodes keyed by node number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    nodes: BTreeMap<NodeId, Node>,
}

impl Grid {
    /// Create an empty grid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the grid has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if a node number is part of the grid.
    #[must_use]
    pub fn contains(&self, number: NodeId) -> bool {
        self.nodes.contains_key(&number)
    }

    /// Get a node.
    #[must_use]
    pub fn node(&self, number: NodeId) -> Option<&Node> {
        self.nodes.get(&number)
    }

    /// Get a node for value updates.
    pub fn node_mut(&mut self, number: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&number)
    }

    /// Iterate nodes in node-number order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Remove all nodes.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Add a node.
    ///
    /// Fails if the node number is taken. Coordinates are not checked against
    /// other nodes; see [`Grid::validate`].
    pub fn add_node(
        &mut self,
        number: NodeId,
        x: f64,
        y: f64,
        z: Option<f64>,
        values: Option<BTreeMap<Field, f64>>,
    ) -> Result<&Node, GridError> {
        if self.contains(number) {
            return Err(GridError::DuplicateNode(number));
        }
        let node = Node::with_values(number, x, y, z, values.unwrap_or_default());
        Ok(&*self.nodes.entry(number).or_insert(node))
    }

    /// Replace an existing node.
    pub fn replace_node(
        &mut self,
        number: NodeId,
        x: f64,
        y: f64,
        z: Option<f64>,
        values: Option<BTreeMap<Field, f64>>,
    ) -> Result<&Node, GridError> {
        let slot = self
            .nodes
            .get_mut(&number)
            .ok_or(GridError::UnknownNode(number))?;
        *slot = Node::with_values(number, x, y, z, values.unwrap_or_default());
        Ok(&*slot)
    }

    /// Bulk-load nodes from records.
    ///
    /// Scalar `value`s are stored under `field` (or [`DEFAULT_FIELD_NAME`]).
    /// Nodes without an explicit number get their zero-based record index.
    /// The load is atomic: on error the grid is left untouched.
    ///
    /// Returns the number of nodes loaded.
    pub fn initiate_grid<I>(
        &mut self,
        records: I,
        field: Option<&Field>,
        clear_first: bool,
    ) -> Result<usize, GridError>
    where
        I: IntoIterator<Item = GridRecord>,
    {
        let default_field = Field::named(DEFAULT_FIELD_NAME);
        let field = field.unwrap_or(&default_field);

        let mut loaded = BTreeMap::new();
        for (index, record) in records.into_iter().enumerate() {
            let node = record.into_node(index, field)?;
            let number = node.number();
            if loaded.contains_key(&number) || (!clear_first && self.contains(number)) {
                return Err(GridError::DuplicateNode(number));
            }
            loaded.insert(number, node);
        }

        let count = loaded.len();
        if clear_first {
            self.nodes = loaded;
        } else {
            self.nodes.append(&mut loaded);
        }

        info!(nodes = count, total = self.len(), %field, "grid initiated");
        Ok(count)
    }

    /// Values of a field for every node that carries it.
    #[must_use]
    pub fn get_node_values(&self, field: &Field) -> BTreeMap<NodeId, f64> {
        self.nodes
            .iter()
            .filter_map(|(number, node)| node.value(field).map(|v| (*number, v)))
            .collect()
    }

    /// A template mapping every node number to `None`.
    ///
    /// Fill it and hand it back through [`Grid::set_node_values`].
    #[must_use]
    pub fn get_empty_nodes(&self) -> BTreeMap<NodeId, Option<f64>> {
        self.nodes.keys().map(|number| (*number, None)).collect()
    }

    /// Write values of a field, then NaN-fill every node still lacking it.
    ///
    /// Fails without writing anything if a node number is unknown. `None`
    /// entries are not written and end up NaN.
    ///
    /// Returns the number of NaN fills.
    pub fn set_node_values<I, V>(&mut self, field: &Field, values: I) -> Result<usize, GridError>
    where
        I: IntoIterator<Item = (NodeId, V)>,
        V: Into<Option<f64>>,
    {
        let values: Vec<(NodeId, Option<f64>)> = values
            .into_iter()
            .map(|(number, value)| (number, value.into()))
            .collect();

        if let Some((number, _)) = values.iter().find(|(number, _)| !self.contains(*number)) {
            return Err(GridError::UnknownNode(*number));
        }

        for (number, value) in values {
            if let (Some(value), Some(node)) = (value, self.nodes.get_mut(&number)) {
                node.set_value(field, value);
            }
        }

        Ok(self.ensure_complete(field))
    }

    /// NaN-fill every node lacking `field`.
    ///
    /// Returns the number of filled nodes.
    pub fn ensure_complete(&mut self, field: &Field) -> usize {
        let mut filled = 0;
        for node in self.nodes.values_mut() {
            if !node.has_value(field) {
                node.set_value(field, f64::NAN);
                filled += 1;
            }
        }
        if filled > 0 {
            debug!(%field, filled, "nodes without value filled with NaN");
        }
        filled
    }

    /// Put `field` back to a previously captured state.
    ///
    /// Nodes listed in `values` get their value back; every other node loses
    /// the field.
    pub(crate) fn restore_field(&mut self, field: &Field, values: &BTreeMap<NodeId, f64>) {
        for (number, node) in &mut self.nodes {
            match values.get(number) {
                Some(value) => node.set_value(field, *value),
                None => {
                    node.remove_value(field);
                }
            }
        }
    }

    /// Node numbers in grid order.
    #[must_use]
    pub fn node_numbers(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Coordinates in grid order, matching [`Grid::node_numbers`].
    #[must_use]
    pub fn get_coordinates_array(&self) -> Vec<[f64; 3]> {
        self.nodes.values().map(Node::coordinates).collect()
    }

    /// Node numbers and coordinates captured together.
    #[must_use]
    pub fn coordinate_table(&self) -> (Vec<NodeId>, Vec<[f64; 3]>) {
        self.nodes
            .iter()
            .map(|(number, node)| (*number, node.coordinates()))
            .unzip()
    }

    /// Rotate every node in-plane about `origin`.
    ///
    /// `angle_degrees` must lie in [0, 360]; z coordinates are untouched.
    pub fn rotate(&mut self, angle_degrees: f64, origin: Origin) -> Result<(), GridError> {
        if !(0.0..=360.0).contains(&angle_degrees) {
            return Err(GridError::InvalidAngle(angle_degrees));
        }

        let rotation = DVec2::from_angle(angle_degrees.to_radians());
        let center = DVec2::new(origin.x, origin.y);
        for node in self.nodes.values_mut() {
            node.rotate(rotation, center);
        }

        debug!(angle_degrees, x = origin.x, y = origin.y, "grid rotated");
        Ok(())
    }

    /// First node (in grid order) sitting exactly at the given coordinates.
    #[must_use]
    pub fn coordinates_exist(&self, x: f64, y: f64, z: Option<f64>) -> Option<NodeId> {
        let target = [x, y, z.unwrap_or(0.0)];
        self.nodes
            .values()
            .find(|node| node.coordinates() == target)
            .map(Node::number)
    }

    /// Report pairs of nodes sharing identical coordinates.
    ///
    /// O(n²); meant for small debug grids. Nothing is changed.
    #[must_use]
    pub fn validate(&self) -> Vec<(NodeId, NodeId)> {
        let nodes: Vec<&Node> = self.nodes.values().collect();
        let mut collisions = Vec::new();
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                if a.coordinates() == b.coordinates() {
                    collisions.push((a.number(), b.number()));
                }
            }
        }
        if !collisions.is_empty() {
            warn!(count = collisions.len(), "nodes with identical coordinates");
        }
        collisions
    }

    /// All fields carried by at least one node, in field order.
    #[must_use]
    pub fn fields(&self) -> BTreeSet<Field> {
        self.nodes
            .values()
            .flat_map(|node| node.values().keys().cloned())
            .collect()
    }

    /// Flattened rows: x, y, z followed by every grid field in field order.
    ///
    /// A node lacking one of the fields contributes NaN in that column.
    #[must_use]
    pub fn get_list(&self) -> Vec<Vec<f64>> {
        let fields = self.fields();
        self.nodes
            .values()
            .map(|node| {
                let mut row = node.coordinates().to_vec();
                row.extend(fields.iter().map(|f| node.value(f).unwrap_or(f64::NAN)));
                row
            })
            .collect()
    }

    /// Axis-aligned bounds of all nodes.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::enclosing(self.nodes.values().map(Node::position))
    }

    /// Statistics of a field over the nodes that carry it (NaN skipped).
    #[must_use]
    pub fn field_stats(&self, field: &Field) -> ScalarStats {
        ScalarStats::from_samples(self.nodes.values().filter_map(|node| node.value(field)))
    }

    /// Independent copy of the geometry, carrying forward only `carry`.
    #[must_use]
    pub fn snapshot(&self, carry: &[Field]) -> Self {
        let nodes = self
            .nodes
            .iter()
            .map(|(number, node)| {
                let values = carry
                    .iter()
                    .filter_map(|f| node.value(f).map(|v| (f.clone(), v)))
                    .collect();
                let [x, y, _] = node.coordinates();
                (*number, Node::with_values(*number, x, y, node.z(), values))
            })
            .collect();
        Self { nodes }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid: number of nodes={}", self.len())
    }
}

impl<'a> IntoIterator for &'a Grid {
    type Item = &'a Node;
    type IntoIter = std::collections::btree_map::Values<'a, NodeId, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.values()
    }
}
