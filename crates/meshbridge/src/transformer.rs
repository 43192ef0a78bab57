//! GridTransformer: registry of named grids and field transfer between them.
//!
//! A transfer runs in two phases. [`GridTransformer::find_nearest_neighbors`]
//! builds a k-d tree over the source grid and caches, for every target node,
//! its nearest source nodes. [`GridTransformer::transition`] then pushes a
//! field along that cached map using inverse-distance weighting, as often as
//! needed while the geometry stays the same.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::TransformError;
use crate::field::Field;
use crate::grid::Grid;
use crate::hash::geometry_fingerprint;
use crate::node::NodeId;
use crate::spatial::{Neighbor, NeighborParams, Neighborhood, SpatialIndex};
use crate::stats::ScalarStats;

/// Name of a registered grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridId(String);

impl GridId {
    /// Create a grid identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for GridId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GridId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for GridId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&GridId> for GridId {
    fn from(id: &GridId) -> Self {
        id.clone()
    }
}

/// Cached neighbors of every target node within one source grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborMap {
    params: NeighborParams,
    entries: BTreeMap<NodeId, Neighborhood>,
    lonely: usize,
    source_fingerprint: u64,
    target_fingerprint: u64,
}

impl NeighborMap {
    /// Parameters the map was built with.
    #[must_use]
    pub fn params(&self) -> &NeighborParams {
        &self.params
    }

    /// Neighborhood of one target node.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&Neighborhood> {
        self.entries.get(&node)
    }

    /// Iterate target nodes and their neighborhoods in node order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Neighborhood)> {
        self.entries.iter().map(|(node, hood)| (*node, hood))
    }

    /// Number of target nodes covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map covers no target node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of target nodes without any neighbor.
    #[must_use]
    pub fn lonely_count(&self) -> usize {
        self.lonely
    }

    /// Target nodes without any neighbor.
    #[must_use]
    pub fn lonely_nodes(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, hood)| hood.is_lonely())
            .map(|(node, _)| node)
            .collect()
    }

    /// Geometry fingerprint of the source grid at build time.
    #[must_use]
    pub fn source_fingerprint(&self) -> u64 {
        self.source_fingerprint
    }

    /// Geometry fingerprint of the target grid at build time.
    #[must_use]
    pub fn target_fingerprint(&self) -> u64 {
        self.target_fingerprint
    }
}

/// Outcome of a neighbor discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborSummary {
    /// Target nodes covered
    pub targets: usize,
    /// Target nodes left without neighbors
    pub lonely: usize,
    /// Total (target, source) pairs stored
    pub pairs: usize,
}

/// Outcome of a field transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    /// Target nodes that received a computed value
    pub written: usize,
    /// Target nodes skipped because the map marks them lonely
    pub lonely: usize,
    /// Target nodes whose neighbors all lacked a usable source value
    pub unresolved: usize,
    /// Target nodes filled with NaN by the completeness check
    pub nan_filled: usize,
}

/// Distance statistics of one cached neighbor map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborStatistics {
    /// Source grid of the map
    pub source: GridId,
    /// Total number of stored neighbors
    pub neighbor_count: usize,
    /// Target nodes without neighbors
    pub lonely: usize,
    /// Neighbor distances
    pub distances: ScalarStats,
}

/// Information loss of a source -> target -> source round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Grid the field started on
    pub source: GridId,
    /// Intermediate grid
    pub target: GridId,
    /// Transferred field
    pub field: Field,
    /// Nodes in the source grid
    pub source_nodes: usize,
    /// Nodes in the target grid
    pub target_nodes: usize,
    /// Source nodes holding NaN after the round trip
    pub nan_count: usize,
    /// `|original - round_tripped|` over nodes where both are finite
    pub difference: ScalarStats,
    /// `|round_tripped / original|` over nodes where the ratio is finite
    pub ratio: ScalarStats,
}

impl ValidationReport {
    /// Mean absolute round-trip error.
    #[must_use]
    pub fn mean_abs_error(&self) -> f64 {
        self.difference.mean
    }
}

/// A registered grid and the neighbor maps that target it.
#[derive(Debug, Clone)]
struct GridEntry {
    grid: Grid,
    /// Keyed by source grid
    transforms: BTreeMap<GridId, NeighborMap>,
}

impl GridEntry {
    fn new(grid: Grid) -> Self {
        Self {
            grid,
            transforms: BTreeMap::new(),
        }
    }
}

/// Registry of named grids with cached neighbor maps.
#[derive(Debug, Clone, Default)]
pub struct GridTransformer {
    grids: BTreeMap<GridId, GridEntry>,
}

impl GridTransformer {
    /// Create an empty transformer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered grids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// Check if no grid is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Check if a grid is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.grids.contains_key(name)
    }

    /// Registered grid names in order.
    pub fn grid_ids(&self) -> impl Iterator<Item = &GridId> {
        self.grids.keys()
    }

    /// Register a grid. Fails if the name is taken.
    pub fn add_grid(&mut self, grid: Grid, name: impl Into<GridId>) -> Result<(), TransformError> {
        let name = name.into();
        if self.grids.contains_key(&name) {
            return Err(TransformError::DuplicateGrid(name));
        }
        debug!(grid = %name, nodes = grid.len(), "grid added");
        self.grids.insert(name, GridEntry::new(grid));
        Ok(())
    }

    /// Replace a registered grid, returning the previous one.
    ///
    /// Neighbor maps targeting the replaced grid are dropped. Maps on other
    /// grids that use it as their source are kept; rerun
    /// [`find_nearest_neighbors`](Self::find_nearest_neighbors) for them.
    pub fn update_grid(
        &mut self,
        grid: Grid,
        name: impl Into<GridId>,
    ) -> Result<Grid, TransformError> {
        let name = name.into();
        let Some(entry) = self.grids.get_mut(&name) else {
            return Err(TransformError::GridNotRegistered(name));
        };
        let previous = std::mem::replace(entry, GridEntry::new(grid));

        let dependent = self
            .grids
            .values()
            .filter(|e| e.transforms.contains_key(&name))
            .count();
        debug!(grid = %name, dependent_maps = dependent, "grid updated");
        Ok(previous.grid)
    }

    /// Unregister a grid and hand it back.
    pub fn remove_grid(&mut self, name: impl Into<GridId>) -> Result<Grid, TransformError> {
        let name = name.into();
        match self.grids.remove(&name) {
            Some(entry) => Ok(entry.grid),
            None => Err(TransformError::UnknownGrid(name)),
        }
    }

    /// Get a registered grid.
    pub fn grid(&self, name: impl Into<GridId>) -> Result<&Grid, TransformError> {
        self.entry(&name.into()).map(|e| &e.grid)
    }

    /// Get a registered grid for modification.
    pub fn grid_mut(&mut self, name: impl Into<GridId>) -> Result<&mut Grid, TransformError> {
        let name = name.into();
        self.grids
            .get_mut(&name)
            .map(|e| &mut e.grid)
            .ok_or(TransformError::UnknownGrid(name))
    }

    /// The cached map from `source` to `target`, if discovered.
    #[must_use]
    pub fn neighbor_map(&self, source: &str, target: &str) -> Option<&NeighborMap> {
        self.grids.get(target)?.transforms.get(source)
    }

    /// Run `op` with caller-owned grids standing in for registered ones.
    ///
    /// Each `(name, grid)` pair is swapped into the registry before `op` runs
    /// and swapped back afterwards, also when `op` fails. Cached neighbor maps
    /// stay in place, so a caller that keeps its grids outside the registry
    /// sees every change `op` makes to them. Repeated names after the first
    /// are ignored.
    pub fn with_lent_grids<R>(
        &mut self,
        lent: &mut [(GridId, &mut Grid)],
        op: impl FnOnce(&mut Self) -> Result<R, TransformError>,
    ) -> Result<R, TransformError> {
        let mut swapped = Vec::with_capacity(lent.len());
        for (i, (name, _)) in lent.iter().enumerate() {
            self.entry(name)?;
            if !lent[..i].iter().any(|(seen, _)| seen == name) {
                swapped.push(i);
            }
        }

        self.swap_lent(lent, &swapped);
        let result = op(self);
        self.swap_lent(lent, &swapped);
        result
    }

    fn swap_lent(&mut self, lent: &mut [(GridId, &mut Grid)], indices: &[usize]) {
        for &i in indices {
            let (name, grid) = &mut lent[i];
            if let Some(entry) = self.grids.get_mut(&*name) {
                std::mem::swap(&mut entry.grid, &mut **grid);
            }
        }
    }

    fn entry(&self, name: &GridId) -> Result<&GridEntry, TransformError> {
        self.grids
            .get(name)
            .ok_or_else(|| TransformError::UnknownGrid(name.clone()))
    }

    /// Find, for every node of `target`, its nearest nodes in `source`.
    ///
    /// The resulting map is cached on the target grid, replacing any earlier
    /// map for the same pair. Target nodes without a neighbor inside
    /// `params.distance_max` are marked lonely and counted; they do not fail
    /// the discovery.
    pub fn find_nearest_neighbors(
        &mut self,
        source: impl Into<GridId>,
        target: impl Into<GridId>,
        params: &NeighborParams,
    ) -> Result<NeighborSummary, TransformError> {
        let source = source.into();
        let target = target.into();
        params.validate()?;

        let source_grid = &self.entry(&source)?.grid;
        let target_grid = &self.entry(&target)?.grid;
        if source_grid.is_empty() {
            return Err(TransformError::EmptyGrid(source));
        }

        let index = SpatialIndex::build(source_grid)?;
        let entries = index.query_grid(target_grid, params)?;

        let lonely = entries.values().filter(|hood| hood.is_lonely()).count();
        let pairs = entries.values().map(|hood| hood.neighbors().len()).sum();
        let map = NeighborMap {
            params: *params,
            lonely,
            source_fingerprint: geometry_fingerprint(source_grid),
            target_fingerprint: geometry_fingerprint(target_grid),
            entries,
        };
        let summary = NeighborSummary {
            targets: map.len(),
            lonely,
            pairs,
        };

        if lonely > 0 {
            warn!(
                %source, %target, lonely,
                distance_max = ?params.distance_max,
                "target nodes without neighbor"
            );
        }

        if let Some(entry) = self.grids.get_mut(&target) {
            entry.transforms.insert(source.clone(), map);
        }
        info!(%source, %target, count = params.count, pairs, "nearest neighbors found");
        Ok(summary)
    }

    /// Transfer `field` from `source` to `target` along the cached map.
    ///
    /// Every target node with usable neighbors gets the inverse-distance
    /// weighted average `Σ(v/d) / Σ(1/d)`. Neighbors at distance zero take
    /// precedence: their plain mean is used. Afterwards every target node
    /// lacking the field is set to NaN. The source grid is not modified.
    pub fn transition(
        &mut self,
        source: impl Into<GridId>,
        field: &Field,
        target: impl Into<GridId>,
    ) -> Result<TransferSummary, TransformError> {
        let source = source.into();
        let target = target.into();

        let source_entry = self.entry(&source)?;
        let target_entry = self.entry(&target)?;

        let source_values = source_entry.grid.get_node_values(field);
        if source_values.is_empty() {
            return Err(TransformError::FieldNotFound {
                grid: source,
                field: field.clone(),
            });
        }

        let map = target_entry.transforms.get(&source).ok_or_else(|| {
            TransformError::MissingNeighborMap {
                source_grid: source.clone(),
                target_grid: target.clone(),
            }
        })?;

        if map.source_fingerprint != geometry_fingerprint(&source_entry.grid)
            || map.target_fingerprint != geometry_fingerprint(&target_entry.grid)
        {
            warn!(%source, %target, "neighbor map was built for a different geometry");
        }

        let mut summary = TransferSummary::default();
        let mut results = Vec::with_capacity(map.len());
        for (node, hood) in map.iter() {
            match hood {
                Neighborhood::Lonely => summary.lonely += 1,
                Neighborhood::Found(neighbors) => {
                    match weighted_value(neighbors, &source_values) {
                        Some(value) => results.push((node, value)),
                        None => summary.unresolved += 1,
                    }
                }
            }
        }

        let target_grid = self.grid_mut(&target)?;
        for (number, value) in results {
            if let Some(node) = target_grid.node_mut(number) {
                node.set_value(field, value);
                summary.written += 1;
            }
        }
        summary.nan_filled = target_grid.ensure_complete(field);

        if summary.unresolved > 0 {
            warn!(%source, %target, %field, unresolved = summary.unresolved,
                "target nodes without usable source values");
        }
        info!(
            %source, %target, %field,
            written = summary.written,
            nan_filled = summary.nan_filled,
            "transition successful"
        );
        Ok(summary)
    }

    /// Distance statistics of every map cached on grid `name`.
    pub fn neighbor_statistics(
        &self,
        name: impl Into<GridId>,
    ) -> Result<Vec<NeighborStatistics>, TransformError> {
        let name = name.into();
        let entry = self.entry(&name)?;

        let stats: Vec<NeighborStatistics> = entry
            .transforms
            .iter()
            .map(|(source, map)| {
                let distances = ScalarStats::from_samples(
                    map.iter()
                        .flat_map(|(_, hood)| hood.neighbors().iter().map(|n| n.distance)),
                );
                NeighborStatistics {
                    source: source.clone(),
                    neighbor_count: usize::try_from(distances.sample_count).unwrap_or(usize::MAX),
                    lonely: map.lonely_count(),
                    distances,
                }
            })
            .collect();

        info!(grid = %name, nodes = entry.grid.len(), "neighbor statistics");
        for s in &stats {
            info!(
                neighborhood_to = %s.source,
                neighbors = s.neighbor_count,
                lonely = s.lonely,
                mean = s.distances.mean,
                std_dev = s.distances.std_dev(),
                min = s.distances.min,
                max = s.distances.max,
                "neighbor distances"
            );
        }
        Ok(stats)
    }

    /// Measure the information lost by transferring `field` to `target` and
    /// back.
    ///
    /// Needs neighbor maps in both directions. The target keeps the
    /// transferred values; the source field is restored afterwards.
    pub fn transformation_validation(
        &mut self,
        source: impl Into<GridId>,
        field: &Field,
        target: impl Into<GridId>,
    ) -> Result<ValidationReport, TransformError> {
        let source = source.into();
        let target = target.into();

        let original = self.grid(&source)?.get_node_values(field);

        self.transition(&source, field, &target)?;
        self.transition(&target, field, &source)?;

        let round_tripped = self.grid(&source)?.get_node_values(field);
        let nan_count = round_tripped.values().filter(|v| v.is_nan()).count();

        let pairs: Vec<(f64, f64)> = original
            .iter()
            .filter_map(|(node, before)| round_tripped.get(node).map(|after| (*before, *after)))
            .collect();
        let difference = ScalarStats::from_samples(
            pairs
                .iter()
                .map(|(before, after)| (before - after).abs())
                .filter(|d| d.is_finite()),
        );
        let ratio = ScalarStats::from_samples(
            pairs
                .iter()
                .map(|(before, after)| (after / before).abs())
                .filter(|r| r.is_finite()),
        );

        let source_grid = self.grid_mut(&source)?;
        let source_nodes = source_grid.len();
        source_grid.restore_field(field, &original);

        let report = ValidationReport {
            source_nodes,
            target_nodes: self.grid(&target)?.len(),
            nan_count,
            difference,
            ratio,
            field: field.clone(),
            source,
            target,
        };

        info!(
            source = %report.source, target = %report.target, field = %report.field,
            source_nodes = report.source_nodes, target_nodes = report.target_nodes,
            nan_values = report.nan_count,
            mean = report.difference.mean,
            std_dev = report.difference.std_dev(),
            mean_match = report.ratio.mean,
            worst_match_max = report.ratio.max,
            worst_match_min = report.ratio.min,
            "transformation validation"
        );
        Ok(report)
    }
}

/// Inverse-distance weighted value of a neighbor list.
///
/// Neighbors without a (non-NaN) source value are skipped. Returns `None`
/// when no neighbor is usable.
fn weighted_value(neighbors: &[Neighbor], values: &BTreeMap<NodeId, f64>) -> Option<f64> {
    let usable: Vec<(f64, f64)> = neighbors
        .iter()
        .filter_map(|n| {
            values
                .get(&n.node)
                .copied()
                .filter(|v| !v.is_nan())
                .map(|v| (v, n.distance))
        })
        .collect();

    if let [(value, _)] = usable.as_slice() {
        return Some(*value);
    }

    let coincident: Vec<f64> = usable
        .iter()
        .filter(|(_, d)| *d == 0.0)
        .map(|(v, _)| *v)
        .collect();
    if !coincident.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let count = coincident.len() as f64;
        return Some(coincident.iter().sum::<f64>() / count);
    }

    let (weighted, weights) = usable
        .iter()
        .fold((0.0, 0.0), |(num, den), (v, d)| (num + v / d, den + 1.0 / d));
    (weights > 0.0).then(|| weighted / weights)
}
