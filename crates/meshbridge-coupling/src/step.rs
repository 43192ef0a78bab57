//! Iteration steps and per-engine step history.
//!
//! Every engine (a solver taking part in the coupling) owns a history of
//! iteration steps. Each step owns the grid the engine produced or consumed
//! in that iteration. A new step starts from an explicit snapshot of the
//! previous step's grid, so steps never share node storage.

use std::fmt;

use meshbridge::{Field, Grid};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CouplingError;

/// Number of step grids kept by default (current and previous).
pub const DEFAULT_RETENTION: usize = 2;

/// Name of a coupled engine, e.g. `abaqus` or `pace3d`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineName(String);

impl EngineName {
    /// Create an engine name.
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

impl fmt::Display for EngineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EngineName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&EngineName> for EngineName {
    fn from(name: &EngineName) -> Self {
        name.clone()
    }
}

/// What a new step takes over from the previous step's grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Carry {
    /// Start from an empty grid
    #[default]
    Nothing,
    /// Copy node numbers and coordinates, no values
    Geometry,
    /// Copy the geometry and the listed fields
    Fields(Vec<Field>),
}

/// One iteration of one engine.
#[derive(Debug, Clone)]
pub struct IterationStep {
    name: String,
    index: usize,
    grid: Option<Grid>,
    computing_time: Option<f64>,
    simulation_time: Option<f64>,
}

impl IterationStep {
    fn new(name: String, index: usize, grid: Grid) -> Self {
        Self {
            name,
            index,
            grid: Some(grid),
            computing_time: None,
            simulation_time: None,
        }
    }

    /// Step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the step in its history, starting at 0.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The step's grid, `None` once dropped by retention.
    #[must_use]
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    /// The step's grid for modification.
    pub fn grid_mut(&mut self) -> Option<&mut Grid> {
        self.grid.as_mut()
    }

    pub(crate) fn take_grid(&mut self) -> Option<Grid> {
        self.grid.take()
    }

    pub(crate) fn put_grid(&mut self, grid: Grid) {
        self.grid = Some(grid);
    }

    /// Wall-clock seconds the engine spent on this step.
    #[must_use]
    pub fn computing_time(&self) -> Option<f64> {
        self.computing_time
    }

    /// Record the wall-clock seconds spent on this step.
    pub fn set_computing_time(&mut self, seconds: f64) {
        self.computing_time = Some(seconds);
    }

    /// Simulated time reached at the end of this step.
    #[must_use]
    pub fn simulation_time(&self) -> Option<f64> {
        self.simulation_time
    }

    /// Record the simulated time reached at the end of this step.
    pub fn set_simulation_time(&mut self, time: f64) {
        self.simulation_time = Some(time);
    }
}

impl fmt::Display for IterationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.grid {
            Some(grid) => write!(f, "name={} grid-size={}", self.name, grid.len()),
            None => write!(f, "name={} grid-size=dropped", self.name),
        }
    }
}

/// Ordered iteration steps of one engine.
#[derive(Debug, Clone)]
pub struct StepHistory {
    engine: EngineName,
    steps: Vec<IterationStep>,
    retention: usize,
}

impl StepHistory {
    /// Create an empty history keeping the grids of the last `retention`
    /// steps (at least one).
    #[must_use]
    pub fn new(engine: EngineName, retention: usize) -> Self {
        Self {
            engine,
            steps: Vec::new(),
            retention: retention.max(1),
        }
    }

    /// Engine owning this history.
    #[must_use]
    pub fn engine(&self) -> &EngineName {
        &self.engine
    }

    /// Number of step grids kept.
    #[must_use]
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Number of steps recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if no step was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check if a step name is taken.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    /// Append a step whose grid is built from the current step per `carry`.
    pub fn add_step(
        &mut self,
        name: impl Into<String>,
        carry: &Carry,
    ) -> Result<&mut IterationStep, CouplingError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(CouplingError::DuplicateStep {
                engine: self.engine.clone(),
                step: name,
            });
        }

        let previous = self.steps.last().and_then(IterationStep::grid);
        let grid = match (carry, previous) {
            (Carry::Nothing, _) | (_, None) => Grid::new(),
            (Carry::Geometry, Some(grid)) => grid.snapshot(&[]),
            (Carry::Fields(fields), Some(grid)) => grid.snapshot(fields),
        };

        let index = self.steps.len();
        debug!(engine = %self.engine, step = %name, index, nodes = grid.len(), "step added");
        self.steps.push(IterationStep::new(name, index, grid));
        self.apply_retention();

        let last = self.steps.len() - 1;
        Ok(&mut self.steps[last])
    }

    fn apply_retention(&mut self) {
        let keep_from = self.steps.len().saturating_sub(self.retention);
        for step in &mut self.steps[..keep_from] {
            if step.grid.take().is_some() {
                debug!(engine = %self.engine, step = %step.name, "grid dropped");
            }
        }
    }

    /// The latest step.
    pub fn current(&self) -> Result<&IterationStep, CouplingError> {
        self.steps
            .last()
            .ok_or_else(|| CouplingError::NoSteps(self.engine.clone()))
    }

    /// The latest step for modification.
    pub fn current_mut(&mut self) -> Result<&mut IterationStep, CouplingError> {
        match self.steps.last_mut() {
            Some(step) => Ok(step),
            None => Err(CouplingError::NoSteps(self.engine.clone())),
        }
    }

    /// The step before the latest one.
    ///
    /// With a single step there is no previous one; the current step is
    /// returned instead and a warning is logged.
    pub fn previous(&self) -> Result<&IterationStep, CouplingError> {
        match self.steps.len() {
            0 => Err(CouplingError::NoSteps(self.engine.clone())),
            1 => {
                warn!(engine = %self.engine, "no previous iteration, returning current");
                self.current()
            }
            n => Ok(&self.steps[n - 2]),
        }
    }

    /// Look up a step by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IterationStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Iterate steps, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &IterationStep> {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshbridge::NodeId;

    fn history() -> StepHistory {
        let mut history = StepHistory::new(EngineName::new("fea"), DEFAULT_RETENTION);
        let step = history.add_step("initial", &Carry::Nothing).unwrap();
        let grid = step.grid_mut().unwrap();
        grid.add_node(NodeId(1), 0.0, 0.0, None, None).unwrap();
        grid.set_node_values(&Field::PorePressure, [(NodeId(1), 3.0)])
            .unwrap();
        grid.set_node_values(&Field::VoidRatio, [(NodeId(1), 0.6)])
            .unwrap();
        history
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let mut history = history();
        assert!(matches!(
            history.add_step("initial", &Carry::Nothing),
            Err(CouplingError::DuplicateStep { .. })
        ));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_carry_modes() {
        let mut history = history();

        let step = history.add_step("empty", &Carry::Nothing).unwrap();
        assert!(step.grid().unwrap().is_empty());

        let mut history = self::history();
        let step = history.add_step("geometry", &Carry::Geometry).unwrap();
        let grid = step.grid().unwrap();
        assert_eq!(grid.node_numbers(), vec![NodeId(1)]);
        assert!(grid.fields().is_empty());

        let mut history = self::history();
        let step = history
            .add_step("fields", &Carry::Fields(vec![Field::VoidRatio]))
            .unwrap();
        let grid = step.grid().unwrap();
        assert_eq!(grid.node(NodeId(1)).unwrap().value(&Field::VoidRatio), Some(0.6));
        assert_eq!(grid.node(NodeId(1)).unwrap().value(&Field::PorePressure), None);
    }

    #[test]
    fn test_carried_grid_is_independent() {
        let mut history = history();
        history
            .add_step("next", &Carry::Fields(vec![Field::PorePressure]))
            .unwrap()
            .grid_mut()
            .unwrap()
            .node_mut(NodeId(1))
            .unwrap()
            .set_value(&Field::PorePressure, 99.0);

        let first = history.get("initial").unwrap().grid().unwrap();
        assert_eq!(first.node(NodeId(1)).unwrap().value(&Field::PorePressure), Some(3.0));
    }

    #[test]
    fn test_retention_drops_old_grids() {
        let mut history = history();
        history.add_step("second", &Carry::Geometry).unwrap();
        history.add_step("third", &Carry::Geometry).unwrap();

        assert_eq!(history.len(), 3);
        assert!(history.get("initial").unwrap().grid().is_none());
        assert!(history.get("second").unwrap().grid().is_some());
        assert!(history.current().unwrap().grid().is_some());
        assert_eq!(history.get("initial").unwrap().to_string(), "name=initial grid-size=dropped");
    }

    #[test]
    fn test_previous_falls_back_to_current() {
        let mut history = history();
        assert_eq!(history.previous().unwrap().name(), "initial");

        history.add_step("second", &Carry::Geometry).unwrap();
        assert_eq!(history.previous().unwrap().name(), "initial");
        assert_eq!(history.current().unwrap().name(), "second");
        assert_eq!(history.current().unwrap().index(), 1);
    }

    #[test]
    fn test_empty_history_has_no_current() {
        let history = StepHistory::new(EngineName::new("tool"), 0);
        assert_eq!(history.retention(), 1);
        assert!(matches!(history.current(), Err(CouplingError::NoSteps(_))));
        assert!(matches!(history.previous(), Err(CouplingError::NoSteps(_))));
    }

    #[test]
    fn test_step_times() {
        let mut history = history();
        let step = history.current_mut().unwrap();
        step.set_computing_time(12.5);
        step.set_simulation_time(3600.0);
        assert_eq!(history.current().unwrap().computing_time(), Some(12.5));
        assert_eq!(history.current().unwrap().simulation_time(), Some(3600.0));
    }

    proptest::proptest! {
        #[test]
        fn retention_keeps_last_grids(retention in 0usize..5, steps in 1usize..10) {
            let mut history = StepHistory::new(EngineName::new("fea"), retention);
            for i in 0..steps {
                history.add_step(format!("step-{i}"), &Carry::Geometry).unwrap();
            }

            let kept: Vec<usize> = history
                .iter()
                .filter(|s| s.grid().is_some())
                .map(IterationStep::index)
                .collect();
            let expected: Vec<usize> = (steps.saturating_sub(retention.max(1))..steps).collect();
            proptest::prop_assert_eq!(kept, expected);
        }
    }
}
