//! # meshbridge-coupling
//!
//! Iteration bookkeeping for coupled simulations built on [`meshbridge`].
//!
//! A coupled run alternates between engines (for example a finite-element
//! solver and a grid-based tool). Each engine produces one grid per
//! iteration; the session keeps those grids, starts each new iteration from
//! an explicit snapshot of the previous one and moves fields between the
//! engines' current grids.
//!
//! - **Sessions**: [`CouplingSession`] owns engines and advances them together
//! - **Steps**: [`StepHistory`] keeps the last few step grids per engine
//! - **Exchanges**: [`Exchange`] describes one field transfer per iteration
//! - **Configuration**: [`SessionConfig`] loads all of the above from JSON
//!
//! ## Usage
//!
//! ```rust
//! use meshbridge::{Field, NeighborParams, NodeId};
//! use meshbridge_coupling::{Carry, CouplingSession, Exchange};
//!
//! let mut session = CouplingSession::new("consolidation");
//! session.add_engine("fea")?;
//! session.add_engine("tool")?;
//! session.add_iteration_step("initial", &Carry::Nothing)?;
//!
//! let fea = session.engine_mut("fea")?.current_mut()?.grid_mut().unwrap();
//! fea.add_node(NodeId(1), 0.0, 0.0, None, None)?;
//! fea.set_node_values(&Field::PorePressure, [(NodeId(1), 4.0)])?;
//! let tool = session.engine_mut("tool")?.current_mut()?.grid_mut().unwrap();
//! tool.add_node(NodeId(1), 1.0, 0.0, None, None)?;
//!
//! let exchange = Exchange::new("fea", "tool", Field::PorePressure)
//!     .with_neighbors(NeighborParams::new(1));
//! let summary = session.exchange(&exchange)?;
//! assert_eq!(summary.written, 1);
//! # Ok::<(), meshbridge_coupling::CouplingError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod step;

#[cfg(test)]
mod tests;

pub use config::{Exchange, SessionConfig};
pub use error::CouplingError;
pub use session::CouplingSession;
pub use step::{Carry, EngineName, IterationStep, StepHistory, DEFAULT_RETENTION};

// Re-export the transfer engine
pub use meshbridge;
