//! Test helper functions for setting up sessions and grids.

use glam::DVec3;
use meshbridge::generate::{regular, sample, scattered};
use meshbridge::{Bounds, Field, Grid, NeighborParams};

use crate::config::Exchange;
use crate::session::CouplingSession;
use crate::step::Carry;

// =============================================================================
// Grid Factories
// =============================================================================

/// Planar domain shared by both engines.
pub fn domain() -> Bounds {
    Bounds::from_min_max(DVec3::ZERO, DVec3::new(40.0, 20.0, 0.0))
}

/// Scattered FEA-like mesh carrying a linear pore pressure field.
pub fn fea_grid(seed: u64) -> Grid {
    let mut grid = scattered(&domain(), 120, seed);
    sample(&mut grid, &Field::PorePressure, |[x, y, _]| 100.0 + x - 0.5 * y);
    grid
}

/// Regular tool grid without values.
pub fn tool_grid() -> Grid {
    regular(&domain(), 9, 5, 1)
}

// =============================================================================
// Session Setup
// =============================================================================

/// Sets up a session with engines `fea` and `tool` and one step `initial`
/// holding [`fea_grid`] and [`tool_grid`].
pub fn setup_session(seed: u64) -> CouplingSession {
    let mut session = CouplingSession::new("test");
    session.add_engine("fea").unwrap();
    session.add_engine("tool").unwrap();
    session.add_iteration_step("initial", &Carry::Nothing).unwrap();

    put_grid(&mut session, "fea", fea_grid(seed));
    put_grid(&mut session, "tool", tool_grid());
    session
}

/// Replace the current grid of an engine.
pub fn put_grid(session: &mut CouplingSession, engine: &str, grid: Grid) {
    *session
        .engine_mut(engine)
        .unwrap()
        .current_mut()
        .unwrap()
        .grid_mut()
        .unwrap() = grid;
}

/// Current grid of an engine.
pub fn current_grid<'a>(session: &'a CouplingSession, engine: &str) -> &'a Grid {
    session
        .engine(engine)
        .unwrap()
        .current()
        .unwrap()
        .grid()
        .unwrap()
}

/// Pore pressure transfer from `fea` to `tool` with four neighbors.
pub fn pressure_exchange() -> Exchange {
    Exchange::new("fea", "tool", Field::PorePressure).with_neighbors(NeighborParams::new(4))
}
