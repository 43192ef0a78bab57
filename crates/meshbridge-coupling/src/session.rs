//! Coupling session: engines, their iteration steps and field exchanges.

use std::collections::BTreeMap;

use meshbridge::{GridTransformer, TransferSummary};
use tracing::{debug, info, warn};

use crate::config::{Exchange, SessionConfig};
use crate::error::CouplingError;
use crate::step::{Carry, EngineName, IterationStep, StepHistory, DEFAULT_RETENTION};

// =============================================================================
// CouplingSession
// =============================================================================

/// A named coupled simulation.
///
/// Owns one [`StepHistory`] per engine and advances them together: every
/// iteration step is added to all engines at once, so the current steps of
/// all engines always belong to the same iteration.
#[derive(Debug, Clone)]
pub struct CouplingSession {
    name: String,
    retention: usize,
    engines: BTreeMap<EngineName, StepHistory>,
    iterations: Vec<String>,
    exchanges: Vec<Exchange>,
}

impl CouplingSession {
    /// Create a session without engines.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(session = %name, "session created");
        Self {
            name,
            retention: DEFAULT_RETENTION,
            engines: BTreeMap::new(),
            iterations: Vec::new(),
            exchanges: Vec::new(),
        }
    }

    /// Set the number of step grids kept per engine added afterwards.
    #[must_use]
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Build a session with the engines and exchanges of a configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self, CouplingError> {
        config.validate()?;
        let mut session = Self::new(config.name.clone()).with_retention(config.retention);
        for engine in &config.engines {
            session.add_engine(engine)?;
        }
        session.exchanges.clone_from(&config.exchanges);
        Ok(session)
    }

    /// Session name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of all iteration steps, oldest first.
    #[must_use]
    pub fn iterations(&self) -> &[String] {
        &self.iterations
    }

    /// Exchanges configured for this session.
    #[must_use]
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Registered engine names.
    pub fn engine_names(&self) -> impl Iterator<Item = &EngineName> {
        self.engines.keys()
    }

    /// Register an engine.
    pub fn add_engine(
        &mut self,
        name: impl Into<EngineName>,
    ) -> Result<&mut StepHistory, CouplingError> {
        let name = name.into();
        if self.engines.contains_key(&name) {
            return Err(CouplingError::DuplicateEngine(name));
        }
        debug!(session = %self.name, engine = %name, "engine added");
        let history = StepHistory::new(name.clone(), self.retention);
        Ok(self.engines.entry(name).or_insert(history))
    }

    /// Step history of an engine.
    pub fn engine(&self, name: impl Into<EngineName>) -> Result<&StepHistory, CouplingError> {
        let name = name.into();
        self.engines
            .get(&name)
            .ok_or(CouplingError::UnknownEngine(name))
    }

    /// Step history of an engine for modification.
    pub fn engine_mut(
        &mut self,
        name: impl Into<EngineName>,
    ) -> Result<&mut StepHistory, CouplingError> {
        let name = name.into();
        self.engines
            .get_mut(&name)
            .ok_or(CouplingError::UnknownEngine(name))
    }

    /// Add a step named `name` to every engine.
    ///
    /// Fails without adding anything when no engine is registered or any
    /// engine already has a step of that name.
    pub fn add_iteration_step(
        &mut self,
        name: impl Into<String>,
        carry: &Carry,
    ) -> Result<usize, CouplingError> {
        let name = name.into();
        if self.engines.is_empty() {
            return Err(CouplingError::NoEngines);
        }
        if let Some(history) = self.engines.values().find(|h| h.contains(&name)) {
            return Err(CouplingError::DuplicateStep {
                engine: history.engine().clone(),
                step: name,
            });
        }

        for history in self.engines.values_mut() {
            history.add_step(name.clone(), carry)?;
        }
        info!(session = %self.name, step = %name, engines = self.engines.len(), "iteration step added");
        self.iterations.push(name);
        Ok(self.iterations.len() - 1)
    }

    /// The latest step of every engine.
    pub fn current_steps(&self) -> Result<BTreeMap<&EngineName, &IterationStep>, CouplingError> {
        self.engines
            .iter()
            .map(|(name, history)| Ok((name, history.current()?)))
            .collect()
    }

    /// The step before the latest of every engine.
    ///
    /// Falls back to the current steps with a warning while only one
    /// iteration exists.
    pub fn previous_steps(&self) -> Result<BTreeMap<&EngineName, &IterationStep>, CouplingError> {
        if self.iterations.len() < 2 {
            warn!(session = %self.name, "only one iteration available, returning current steps");
            return self.current_steps();
        }
        self.engines
            .iter()
            .map(|(name, history)| Ok((name, history.previous()?)))
            .collect()
    }

    /// Transfer a field between the current steps of two engines.
    ///
    /// Both grids are lent to a [`GridTransformer`] for neighbor discovery and
    /// the transition, then handed back to their steps, also when the
    /// transfer fails.
    pub fn exchange(&mut self, exchange: &Exchange) -> Result<TransferSummary, CouplingError> {
        if exchange.source == exchange.target {
            return Err(CouplingError::SelfExchange(exchange.source.clone()));
        }

        let source_grid = self.take_current_grid(&exchange.source)?;
        let target_grid = match self.take_current_grid(&exchange.target) {
            Ok(grid) => grid,
            Err(err) => {
                self.return_current_grid(&exchange.source, source_grid);
                return Err(err);
            }
        };

        let source_id = exchange.source.as_str();
        let target_id = exchange.target.as_str();
        let mut transformer = GridTransformer::new();
        transformer.add_grid(source_grid, source_id)?;
        transformer.add_grid(target_grid, target_id)?;

        let result = transformer
            .find_nearest_neighbors(source_id, target_id, &exchange.neighbors)
            .and_then(|_| transformer.transition(source_id, &exchange.field, target_id));

        for engine in [&exchange.source, &exchange.target] {
            if let Ok(grid) = transformer.remove_grid(engine.as_str()) {
                self.return_current_grid(engine, grid);
            }
        }

        let summary = result?;
        info!(
            session = %self.name,
            source = %exchange.source,
            target = %exchange.target,
            field = %exchange.field,
            written = summary.written,
            "exchange complete"
        );
        Ok(summary)
    }

    /// Run every configured exchange in order.
    pub fn exchange_all(&mut self) -> Result<Vec<TransferSummary>, CouplingError> {
        let exchanges = self.exchanges.clone();
        exchanges.iter().map(|e| self.exchange(e)).collect()
    }

    fn take_current_grid(&mut self, engine: &EngineName) -> Result<meshbridge::Grid, CouplingError> {
        let step = self.engine_mut(engine)?.current_mut()?;
        step.take_grid().ok_or_else(|| CouplingError::GridDropped {
            engine: engine.clone(),
            step: step.name().to_string(),
        })
    }

    fn return_current_grid(&mut self, engine: &EngineName, grid: meshbridge::Grid) {
        if let Some(history) = self.engines.get_mut(engine) {
            if let Ok(step) = history.current_mut() {
                step.put_grid(grid);
            }
        }
    }
}
