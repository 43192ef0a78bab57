//! # meshbridge Python Bindings
//!
//! PyO3 bindings exposing meshbridge grids and the grid transformer to Python
//! driver scripts.
//!
//! ## Usage
//!
//! ```python
//! from meshbridge import Grid, GridTransformer, Field
//!
//! fea = Grid()
//! fea.initiate_grid(abaqus_rows, value_name="pore_pressure")
//! tool = Grid()
//! tool.initiate_grid(pace3d_rows)
//!
//! transformer = GridTransformer()
//! transformer.add_grid(fea, "abaqus")
//! transformer.add_grid(tool, "pace3d")
//! transformer.find_nearest_neighbors("abaqus", "pace3d", neighbors=4)
//! transformer.transition("abaqus", Field.PORE_PRESSURE, "pace3d")
//!
//! # grids are shared with the transformer, so `tool` holds the result
//! values = tool.get_node_values("pore_pressure")
//! coordinates = tool.get_coordinates_array()  # (n, 3)
//! ```

use std::collections::{BTreeMap, HashMap};

use meshbridge::{
    GridError, GridId, GridRecord, GridTransformer, NeighborParams, NodeId, Origin,
    TransformError,
};
use numpy::ndarray::Array2;
use numpy::{PyArray2, ToPyArray};
use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

/// Well-known fields for Python.
///
/// Any other field is addressed by its name as a plain string.
#[pyclass(eq, eq_int, hash, frozen)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[allow(non_camel_case_types)] // Python convention uses SCREAMING_SNAKE_CASE for enums
pub enum Field {
    /// Pore water pressure
    PORE_PRESSURE,
    /// Void ratio
    VOID_RATIO,
    /// Porosity
    POROSITY,
}

impl From<Field> for meshbridge::Field {
    fn from(f: Field) -> Self {
        match f {
            Field::PORE_PRESSURE => meshbridge::Field::PorePressure,
            Field::VOID_RATIO => meshbridge::Field::VoidRatio,
            Field::POROSITY => meshbridge::Field::Porosity,
        }
    }
}

/// Accept either the Field enum or a field name.
#[derive(FromPyObject)]
enum FieldOrStr {
    Field(Field),
    Str(String),
}

impl From<FieldOrStr> for meshbridge::Field {
    fn from(f: FieldOrStr) -> Self {
        match f {
            FieldOrStr::Field(field) => field.into(),
            FieldOrStr::Str(name) => meshbridge::Field::from(name),
        }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Lookup and registration failures become `KeyError`, bad data `ValueError`.
fn transform_err(err: TransformError) -> PyErr {
    match err {
        TransformError::Grid(err) => grid_err(err),
        TransformError::UnknownGrid(_)
        | TransformError::DuplicateGrid(_)
        | TransformError::GridNotRegistered(_)
        | TransformError::FieldNotFound { .. }
        | TransformError::MissingNeighborMap { .. } => PyKeyError::new_err(err.to_string()),
        TransformError::InvalidNeighborCount
        | TransformError::EmptyGrid(_)
        | TransformError::SpatialIndex(_) => PyValueError::new_err(err.to_string()),
    }
}

fn grid_err(err: GridError) -> PyErr {
    match err {
        GridError::DuplicateNode(_) | GridError::UnknownNode(_) | GridError::MissingOrigin(_) => {
            PyKeyError::new_err(err.to_string())
        }
        GridError::MissingCoordinate { .. }
        | GridError::MalformedRecord { .. }
        | GridError::InvalidAngle(_) => PyValueError::new_err(err.to_string()),
    }
}

// =============================================================================
// Record Conversion
// =============================================================================

fn optional<'py, T>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Option<T>>
where
    T: FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(item) if !item.is_none() => Ok(Some(item.extract()?)),
        _ => Ok(None),
    }
}

fn field_map(values: HashMap<String, f64>) -> BTreeMap<meshbridge::Field, f64> {
    values
        .into_iter()
        .map(|(name, value)| (meshbridge::Field::from(name), value))
        .collect()
}

/// Convert one reader row (`{"x_coordinate": .., "y_coordinate": .., ...}`).
fn record_from_dict(dict: &Bound<'_, PyDict>) -> PyResult<GridRecord> {
    Ok(GridRecord {
        node_number: optional(dict, "node_number")?,
        x: optional(dict, "x_coordinate")?,
        y: optional(dict, "y_coordinate")?,
        z: optional(dict, "z_coordinate")?,
        value: optional(dict, "value")?,
        values: optional::<HashMap<String, f64>>(dict, "values")?.map(field_map),
    })
}

// =============================================================================
// Grid
// =============================================================================

/// Node-number keyed point set with named field values.
#[pyclass(name = "Grid")]
#[derive(Clone, Default)]
pub struct PyGrid {
    inner: meshbridge::Grid,
}

#[pymethods]
impl PyGrid {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    #[pyo3(signature = (node_number, x, y, z=None, values=None))]
    fn add_node(
        &mut self,
        node_number: u64,
        x: f64,
        y: f64,
        z: Option<f64>,
        values: Option<HashMap<String, f64>>,
    ) -> PyResult<()> {
        self.inner
            .add_node(NodeId(node_number), x, y, z, values.map(field_map))
            .map(|_| ())
            .map_err(grid_err)
    }

    /// Replace an existing node.
    #[pyo3(signature = (node_number, x, y, z=None, values=None))]
    fn set_node(
        &mut self,
        node_number: u64,
        x: f64,
        y: f64,
        z: Option<f64>,
        values: Option<HashMap<String, f64>>,
    ) -> PyResult<()> {
        self.inner
            .replace_node(NodeId(node_number), x, y, z, values.map(field_map))
            .map(|_| ())
            .map_err(grid_err)
    }

    /// Bulk-load reader rows; returns the number of loaded nodes.
    #[pyo3(signature = (data, value_name=None, clear_first=true))]
    fn initiate_grid(
        &mut self,
        data: &Bound<'_, PyList>,
        value_name: Option<FieldOrStr>,
        clear_first: bool,
    ) -> PyResult<usize> {
        let records = data
            .iter()
            .map(|row| record_from_dict(row.downcast::<PyDict>()?))
            .collect::<PyResult<Vec<_>>>()?;
        let field = value_name.map(meshbridge::Field::from);
        self.inner
            .initiate_grid(records, field.as_ref(), clear_first)
            .map_err(grid_err)
    }

    fn get_node_values(&self, field: FieldOrStr) -> HashMap<u64, f64> {
        self.inner
            .get_node_values(&field.into())
            .into_iter()
            .map(|(node, value)| (node.as_u64(), value))
            .collect()
    }

    fn get_empty_nodes(&self) -> HashMap<u64, Option<f64>> {
        self.inner
            .get_empty_nodes()
            .into_keys()
            .map(|node| (node.as_u64(), None))
            .collect()
    }

    /// Write values; nodes left without the field become NaN.
    fn set_node_values(
        &mut self,
        field: FieldOrStr,
        values: HashMap<u64, Option<f64>>,
    ) -> PyResult<usize> {
        self.inner
            .set_node_values(
                &field.into(),
                values.into_iter().map(|(node, value)| (NodeId(node), value)),
            )
            .map_err(grid_err)
    }

    fn node_numbers(&self) -> Vec<u64> {
        self.inner.node_numbers().into_iter().map(NodeId::as_u64).collect()
    }

    /// Coordinates as a `(n, 3)` float64 array in `node_numbers()` order.
    fn get_coordinates_array<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let coordinates = self.inner.get_coordinates_array();
        let rows = coordinates.len();
        let flat: Vec<f64> = coordinates.into_iter().flatten().collect();
        let array = Array2::from_shape_vec((rows, 3), flat)
            .map_err(|err| PyValueError::new_err(err.to_string()))?;
        Ok(array.to_pyarray(py))
    }

    fn get_list(&self) -> Vec<Vec<f64>> {
        self.inner.get_list()
    }

    /// Rotate in-plane about `origin` (`{"x_coordinate": .., "y_coordinate": ..}`).
    fn rotate(&mut self, angle: f64, origin: HashMap<String, f64>) -> PyResult<()> {
        let origin = Origin::from_map(&origin).map_err(grid_err)?;
        self.inner.rotate(angle, origin).map_err(grid_err)
    }

    #[pyo3(signature = (x, y, z=None))]
    fn coordinates_exist(&self, x: f64, y: f64, z: Option<f64>) -> Option<u64> {
        self.inner.coordinates_exist(x, y, z).map(NodeId::as_u64)
    }

    fn validate(&self) -> Vec<(u64, u64)> {
        self.inner
            .validate()
            .into_iter()
            .map(|(a, b)| (a.as_u64(), b.as_u64()))
            .collect()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

// =============================================================================
// GridTransformer
// =============================================================================

/// Registry of named grids with cached neighbor maps.
///
/// The registered `Grid` objects are shared with the caller, not copied:
/// `transition` writes into the very object passed to `add_grid`. The core
/// registry holds placeholders and borrows the Python grids for the duration
/// of each call.
#[pyclass(name = "GridTransformer")]
#[derive(Default)]
pub struct PyGridTransformer {
    inner: GridTransformer,
    grids: BTreeMap<String, Py<PyGrid>>,
}

impl PyGridTransformer {
    fn handle(&self, grid_name: &str) -> PyResult<&Py<PyGrid>> {
        self.grids
            .get(grid_name)
            .ok_or_else(|| transform_err(TransformError::UnknownGrid(grid_name.into())))
    }

    /// Run `op` on the core registry with the named Python grids lent to it.
    fn with_grids<R>(
        &mut self,
        py: Python<'_>,
        names: &[&str],
        op: impl FnOnce(&mut GridTransformer) -> Result<R, TransformError>,
    ) -> PyResult<R> {
        let mut borrowed: Vec<(&str, PyRefMut<'_, PyGrid>)> = Vec::with_capacity(names.len());
        for &name in names {
            if borrowed.iter().any(|(seen, _)| *seen == name) {
                continue;
            }
            let grid = self.handle(name)?.bind(py).try_borrow_mut()?;
            borrowed.push((name, grid));
        }

        let mut lent: Vec<(GridId, &mut meshbridge::Grid)> = borrowed
            .iter_mut()
            .map(|(name, grid)| (GridId::from(*name), &mut grid.inner))
            .collect();
        self.inner
            .with_lent_grids(&mut lent, op)
            .map_err(transform_err)
    }
}

#[pymethods]
impl PyGridTransformer {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Register `grid` under `grid_name`. Later transfers write into it.
    fn add_grid(&mut self, grid: Py<PyGrid>, grid_name: &str) -> PyResult<()> {
        self.inner
            .add_grid(meshbridge::Grid::new(), grid_name)
            .map_err(transform_err)?;
        self.grids.insert(grid_name.to_owned(), grid);
        Ok(())
    }

    /// Register `grid` in place of the one under `grid_name`.
    fn update_grid(&mut self, grid: Py<PyGrid>, grid_name: &str) -> PyResult<()> {
        self.inner
            .update_grid(meshbridge::Grid::new(), grid_name)
            .map_err(transform_err)?;
        self.grids.insert(grid_name.to_owned(), grid);
        Ok(())
    }

    /// The grid object registered under `grid_name`.
    fn get_grid(&self, py: Python<'_>, grid_name: &str) -> PyResult<Py<PyGrid>> {
        Ok(self.handle(grid_name)?.clone_ref(py))
    }

    /// Write values into a registered grid.
    fn set_node_values(
        &self,
        py: Python<'_>,
        grid_name: &str,
        field: FieldOrStr,
        values: HashMap<u64, Option<f64>>,
    ) -> PyResult<usize> {
        self.handle(grid_name)?
            .bind(py)
            .try_borrow_mut()?
            .inner
            .set_node_values(
                &field.into(),
                values.into_iter().map(|(node, value)| (NodeId(node), value)),
            )
            .map_err(grid_err)
    }

    fn grid_names(&self) -> Vec<String> {
        self.grids.keys().cloned().collect()
    }

    /// Returns `(targets, lonely)`.
    #[pyo3(signature = (source, target, neighbors=10, distance_max=None))]
    fn find_nearest_neighbors(
        &mut self,
        py: Python<'_>,
        source: &str,
        target: &str,
        neighbors: usize,
        distance_max: Option<f64>,
    ) -> PyResult<(usize, usize)> {
        let params = NeighborParams {
            count: neighbors,
            distance_max,
        };
        let summary = self.with_grids(py, &[source, target], |inner| {
            py.allow_threads(|| inner.find_nearest_neighbors(source, target, &params))
        })?;
        Ok((summary.targets, summary.lonely))
    }

    /// Transfer `field` into the target grid; returns the number of nodes
    /// written.
    ///
    /// ```python
    /// transformer.add_grid(tool, "pace3d")
    /// transformer.transition("abaqus", "pore_pressure", "pace3d")
    /// tool.get_node_values("pore_pressure")  # the transferred values
    /// ```
    fn transition(
        &mut self,
        py: Python<'_>,
        source: &str,
        field: FieldOrStr,
        target: &str,
    ) -> PyResult<usize> {
        let field: meshbridge::Field = field.into();
        let summary = self.with_grids(py, &[source, target], |inner| {
            inner.transition(source, &field, target)
        })?;
        Ok(summary.written)
    }

    /// Per cached map on `grid_name`: `(source, mean, std_dev, min, max)`
    /// of the neighbor distances.
    fn nearest_neighbors_stat(
        &mut self,
        py: Python<'_>,
        grid_name: &str,
    ) -> PyResult<Vec<(String, f64, f64, f64, f64)>> {
        let stats = self.with_grids(py, &[grid_name], |inner| {
            inner.neighbor_statistics(grid_name)
        })?;
        Ok(stats
            .into_iter()
            .map(|s| {
                (
                    s.source.to_string(),
                    s.distances.mean,
                    s.distances.std_dev(),
                    s.distances.min,
                    s.distances.max,
                )
            })
            .collect())
    }

    /// Round-trip report as a dict.
    fn transformation_validation<'py>(
        &mut self,
        py: Python<'py>,
        source: &str,
        field: FieldOrStr,
        target: &str,
    ) -> PyResult<Bound<'py, PyDict>> {
        let field: meshbridge::Field = field.into();
        let report = self.with_grids(py, &[source, target], |inner| {
            inner.transformation_validation(source, &field, target)
        })?;

        let dict = PyDict::new(py);
        dict.set_item("source_nodes", report.source_nodes)?;
        dict.set_item("target_nodes", report.target_nodes)?;
        dict.set_item("nan_values", report.nan_count)?;
        dict.set_item("mean", report.difference.mean)?;
        dict.set_item("std_dev", report.difference.std_dev())?;
        dict.set_item("min", report.difference.min)?;
        dict.set_item("max", report.difference.max)?;
        dict.set_item("mean_match", report.ratio.mean)?;
        dict.set_item("worst_match_min", report.ratio.min)?;
        dict.set_item("worst_match_max", report.ratio.max)?;
        Ok(dict)
    }

    fn __len__(&self) -> usize {
        self.grids.len()
    }
}

/// Install the log subscriber; `RUST_LOG` overrides `level`.
#[pyfunction]
#[pyo3(signature = (level="info"))]
fn init_logging(level: &str) -> bool {
    meshbridge_coupling::logging::init(level)
}

/// Python module definition.
#[pymodule]
fn _meshbridge(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Field>()?;
    m.add_class::<PyGrid>()?;
    m.add_class::<PyGridTransformer>()?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    Ok(())
}
