//! Round-trip a noisy pore pressure field between a scattered FEA mesh and a
//! regular tool grid over a few coupled iterations.
//!
//! Run with `RUST_LOG=debug` for per-node output.

use anyhow::Result;
use glam::DVec3;
use meshbridge::generate::{regular, sample, scattered};
use meshbridge::{Bounds, Field, GridTransformer, NeighborParams};
use meshbridge_coupling::{logging, Carry, CouplingSession, Exchange};

fn main() -> Result<()> {
    logging::init("info");

    let domain = Bounds::from_min_max(DVec3::ZERO, DVec3::new(50.0, 20.0, 0.0));

    let mut fea = scattered(&domain, 400, 2024);
    sample(&mut fea, &Field::PorePressure, |[x, y, _]| 50.0 + x * 0.8 - y * 0.3);
    let pressure = fea.get_node_values(&Field::PorePressure);
    let noisy = meshbridge::FieldRandomizer::new(7).randomize(&pressure, 0.05)?;
    fea.set_node_values(&Field::PorePressure, noisy)?;

    // Validation on a standalone transformer
    let mut transformer = GridTransformer::new();
    transformer.add_grid(fea.clone(), "fea")?;
    transformer.add_grid(regular(&domain, 26, 11, 1), "tool")?;
    transformer.find_nearest_neighbors("fea", "tool", &NeighborParams::new(4))?;
    transformer.find_nearest_neighbors("tool", "fea", &NeighborParams::new(4))?;
    transformer.neighbor_statistics("tool")?;
    let report = transformer.transformation_validation("fea", &Field::PorePressure, "tool")?;
    println!(
        "round trip: mean |error| = {:.4}, worst ratio = [{:.4}, {:.4}]",
        report.mean_abs_error(),
        report.ratio.min,
        report.ratio.max
    );

    // Coupled iterations
    let mut session = CouplingSession::new("round_trip");
    session.add_engine("fea")?;
    session.add_engine("tool")?;
    session.add_iteration_step("initial", &Carry::Nothing)?;
    if let Some(grid) = session.engine_mut("fea")?.current_mut()?.grid_mut() {
        *grid = fea;
    }
    if let Some(grid) = session.engine_mut("tool")?.current_mut()?.grid_mut() {
        *grid = regular(&domain, 26, 11, 1);
    }

    let there = Exchange::new("fea", "tool", Field::PorePressure)
        .with_neighbors(NeighborParams::new(4));
    let back = Exchange::new("tool", "fea", Field::PorePressure)
        .with_neighbors(NeighborParams::new(4));

    for i in 1..=3 {
        let to_tool = session.exchange(&there)?;
        let to_fea = session.exchange(&back)?;
        println!(
            "iteration {i}: {} tool nodes, {} fea nodes updated",
            to_tool.written, to_fea.written
        );
        session.add_iteration_step(
            format!("iteration-{i}"),
            &Carry::Fields(vec![Field::PorePressure]),
        )?;
    }

    for (engine, step) in session.current_steps()? {
        println!("{engine}: {step}");
    }
    Ok(())
}
