//! Session configuration.
//!
//! A coupled run is described by a JSON document naming the engines and the
//! field exchanges performed every iteration:
//!
//! ```json
//! {
//!   "name": "consolidation",
//!   "retention": 2,
//!   "log_level": "info",
//!   "engines": ["abaqus", "pace3d"],
//!   "exchanges": [
//!     {"source": "abaqus", "target": "pace3d", "field": "pore_pressure",
//!      "neighbors": {"count": 4, "distance_max": 2.5}}
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use meshbridge::{Field, NeighborParams};
use serde::{Deserialize, Serialize};

use crate::error::CouplingError;
use crate::step::{EngineName, DEFAULT_RETENTION};

/// One field transfer between the current steps of two engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Engine providing the field
    pub source: EngineName,
    /// Engine receiving the field
    pub target: EngineName,
    /// Field to transfer
    pub field: Field,
    /// Neighbor discovery parameters
    #[serde(default)]
    pub neighbors: NeighborParams,
}

impl Exchange {
    /// Transfer `field` from `source` to `target` with default neighbor
    /// parameters.
    #[must_use]
    pub fn new(source: impl Into<EngineName>, target: impl Into<EngineName>, field: Field) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            field,
            neighbors: NeighborParams::default(),
        }
    }

    /// Set the neighbor discovery parameters.
    #[must_use]
    pub fn with_neighbors(mut self, neighbors: NeighborParams) -> Self {
        self.neighbors = neighbors;
        self
    }
}

/// Configuration of a coupling session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session name
    pub name: String,
    /// Number of step grids kept per engine
    pub retention: usize,
    /// Filter directive for [`crate::logging::init`]
    pub log_level: String,
    /// Engines taking part
    pub engines: Vec<EngineName>,
    /// Exchanges run each iteration, in order
    pub exchanges: Vec<Exchange>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "simulation".to_string(),
            retention: DEFAULT_RETENTION,
            log_level: "info".to_string(),
            engines: Vec::new(),
            exchanges: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, CouplingError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CouplingError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, CouplingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every exchange names known, distinct engines with a usable
    /// neighbor count, and that the log level parses.
    pub fn validate(&self) -> Result<(), CouplingError> {
        for exchange in &self.exchanges {
            for engine in [&exchange.source, &exchange.target] {
                if !self.engines.contains(engine) {
                    return Err(CouplingError::UnknownEngine(engine.clone()));
                }
            }
            if exchange.source == exchange.target {
                return Err(CouplingError::SelfExchange(exchange.source.clone()));
            }
            exchange.neighbors.validate()?;
        }

        self.log_level
            .parse::<tracing_subscriber::EnvFilter>()
            .map_err(|_| CouplingError::InvalidLogLevel(self.log_level.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "consolidation",
        "engines": ["abaqus", "pace3d"],
        "exchanges": [
            {"source": "abaqus", "target": "pace3d", "field": "pore_pressure",
             "neighbors": {"count": 4, "distance_max": 2.5}},
            {"source": "pace3d", "target": "abaqus", "field": "porosity"}
        ]
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = SessionConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.name, "consolidation");
        assert_eq!(config.retention, DEFAULT_RETENTION);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.exchanges.len(), 2);
        assert_eq!(config.exchanges[0].field, Field::PorePressure);
        assert_eq!(
            config.exchanges[0].neighbors,
            NeighborParams::new(4).with_distance_max(2.5)
        );
        assert_eq!(config.exchanges[1].neighbors, NeighborParams::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SessionConfig::from_json(SAMPLE).unwrap();
        let json = config.to_json().unwrap();
        assert_eq!(SessionConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let json = r#"{"engines": ["abaqus"],
            "exchanges": [{"source": "abaqus", "target": "pace3d", "field": "porosity"}]}"#;
        assert!(matches!(
            SessionConfig::from_json(json),
            Err(CouplingError::UnknownEngine(name)) if name.as_str() == "pace3d"
        ));
    }

    #[test]
    fn test_self_exchange_rejected() {
        let json = r#"{"engines": ["abaqus"],
            "exchanges": [{"source": "abaqus", "target": "abaqus", "field": "porosity"}]}"#;
        assert!(matches!(
            SessionConfig::from_json(json),
            Err(CouplingError::SelfExchange(_))
        ));
    }

    #[test]
    fn test_zero_neighbors_rejected() {
        let json = r#"{"engines": ["a", "b"],
            "exchanges": [{"source": "a", "target": "b", "field": "porosity",
                           "neighbors": {"count": 0}}]}"#;
        assert!(matches!(
            SessionConfig::from_json(json),
            Err(CouplingError::Transform(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            SessionConfig::from_json("{\"retention\": \"two\"}"),
            Err(CouplingError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SessionConfig::from_path("/nonexistent/meshbridge.json"),
            Err(CouplingError::Io(_))
        ));
    }
}
