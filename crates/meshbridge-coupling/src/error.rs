//! Error types for the coupling layer.

use meshbridge::{GridError, TransformError};
use thiserror::Error;

use crate::step::EngineName;

/// Errors raised while managing engines, steps and exchanges.
#[derive(Debug, Error)]
pub enum CouplingError {
    /// An iteration step was requested before any engine was registered.
    #[error("engines must be added before adding an iteration step")]
    NoEngines,

    /// Engine name already registered.
    #[error("engine {0} already exists")]
    DuplicateEngine(EngineName),

    /// Engine name not registered.
    #[error("engine {0} not found")]
    UnknownEngine(EngineName),

    /// Step name already used by an engine.
    #[error("engine {engine} already has a step named {step}")]
    DuplicateStep {
        /// Engine holding the step
        engine: EngineName,
        /// Step name
        step: String,
    },

    /// Engine has no iteration step yet.
    #[error("engine {0} has no iteration steps")]
    NoSteps(EngineName),

    /// The step's grid fell out of the retention window.
    #[error("grid of step {step} of engine {engine} has been dropped")]
    GridDropped {
        /// Engine holding the step
        engine: EngineName,
        /// Step name
        step: String,
    },

    /// An exchange names the same engine on both sides.
    #[error("engine {0} cannot exchange with itself")]
    SelfExchange(EngineName),

    /// Log level string could not be parsed.
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    /// Error from the transfer engine.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Error from grid editing.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}
