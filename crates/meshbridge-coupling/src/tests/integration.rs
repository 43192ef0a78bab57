//! Integration tests for sessions running several iterations.

use meshbridge::{state_hash, Field, NeighborParams, NodeId};

use crate::config::{Exchange, SessionConfig};
use crate::error::CouplingError;
use crate::session::CouplingSession;
use crate::step::Carry;

use super::helpers::{current_grid, pressure_exchange, put_grid, setup_session, tool_grid};

// =============================================================================
// Exchanges
// =============================================================================

#[test]
fn test_exchange_fills_every_target_node() {
    let mut session = setup_session(1);
    let range = current_grid(&session, "fea").field_stats(&Field::PorePressure);

    let summary = session.exchange(&pressure_exchange()).unwrap();
    assert_eq!(summary.written, 45);
    assert_eq!(summary.nan_filled, 0);

    let values = current_grid(&session, "tool").get_node_values(&Field::PorePressure);
    assert_eq!(values.len(), 45);
    for value in values.values() {
        assert!(*value >= range.min - 1e-9 && *value <= range.max + 1e-9);
    }
}

#[test]
fn test_exchange_hands_grids_back_unchanged_source() {
    let mut session = setup_session(2);
    let before = state_hash(current_grid(&session, "fea"));

    session.exchange(&pressure_exchange()).unwrap();

    assert_eq!(state_hash(current_grid(&session, "fea")), before);
    assert_eq!(current_grid(&session, "tool").len(), 45);
}

#[test]
fn test_failed_exchange_still_returns_grids() {
    let mut session = setup_session(3);
    let exchange = Exchange::new("fea", "tool", Field::Porosity);

    assert!(matches!(
        session.exchange(&exchange),
        Err(CouplingError::Transform(_))
    ));
    assert_eq!(current_grid(&session, "fea").len(), 120);
    assert_eq!(current_grid(&session, "tool").len(), 45);
}

#[test]
fn test_exchange_with_unknown_engine_returns_source_grid() {
    let mut session = setup_session(4);
    let exchange = Exchange::new("fea", "lab", Field::PorePressure);

    assert!(matches!(
        session.exchange(&exchange),
        Err(CouplingError::UnknownEngine(_))
    ));
    assert_eq!(current_grid(&session, "fea").len(), 120);
}

#[test]
fn test_self_exchange_rejected() {
    let mut session = setup_session(5);
    let exchange = Exchange::new("fea", "fea", Field::PorePressure);
    assert!(matches!(
        session.exchange(&exchange),
        Err(CouplingError::SelfExchange(_))
    ));
}

#[test]
fn test_lonely_targets_end_up_nan() {
    let mut session = setup_session(6);
    let mut tool = tool_grid();
    tool.add_node(NodeId(1000), 500.0, 500.0, None, None).unwrap();
    put_grid(&mut session, "tool", tool);

    let exchange = pressure_exchange().with_neighbors(NeighborParams::new(4).with_distance_max(30.0));
    let summary = session.exchange(&exchange).unwrap();

    assert_eq!(summary.lonely, 1);
    let far = current_grid(&session, "tool")
        .node(NodeId(1000))
        .unwrap()
        .value(&Field::PorePressure)
        .unwrap();
    assert!(far.is_nan());
}

// =============================================================================
// Iteration Steps
// =============================================================================

#[test]
fn test_iteration_steps_need_engines() {
    let mut session = CouplingSession::new("empty");
    assert!(matches!(
        session.add_iteration_step("initial", &Carry::Nothing),
        Err(CouplingError::NoEngines)
    ));
}

#[test]
fn test_duplicate_engine_rejected() {
    let mut session = setup_session(7);
    assert!(matches!(
        session.add_engine("fea"),
        Err(CouplingError::DuplicateEngine(_))
    ));
}

#[test]
fn test_duplicate_iteration_step_adds_nothing() {
    let mut session = setup_session(8);
    assert!(matches!(
        session.add_iteration_step("initial", &Carry::Geometry),
        Err(CouplingError::DuplicateStep { .. })
    ));
    assert_eq!(session.iterations().len(), 1);
    assert_eq!(session.engine("fea").unwrap().len(), 1);
    assert_eq!(session.engine("tool").unwrap().len(), 1);
}

#[test]
fn test_iterations_carry_geometry_and_fields() {
    let mut session = setup_session(9);
    session.exchange(&pressure_exchange()).unwrap();

    let index = session
        .add_iteration_step("second", &Carry::Fields(vec![Field::PorePressure]))
        .unwrap();
    assert_eq!(index, 1);

    let previous = session.previous_steps().unwrap();
    assert!(previous.values().all(|step| step.name() == "initial"));

    let current = session.current_steps().unwrap();
    assert!(current.values().all(|step| step.name() == "second"));
    let tool = current.values().find(|s| s.grid().unwrap().len() == 45).unwrap();
    assert_eq!(
        tool.grid().unwrap().get_node_values(&Field::PorePressure).len(),
        45
    );
}

#[test]
fn test_previous_steps_fall_back_to_current() {
    let session = setup_session(10);
    let previous = session.previous_steps().unwrap();
    assert!(previous.values().all(|step| step.name() == "initial"));
}

#[test]
fn test_retention_keeps_exchanges_working() {
    let mut session = setup_session(11);
    for step in ["second", "third", "fourth"] {
        session
            .add_iteration_step(step, &Carry::Fields(vec![Field::PorePressure]))
            .unwrap();
        session.exchange(&pressure_exchange()).unwrap();
    }

    let fea = session.engine("fea").unwrap();
    assert!(fea.get("initial").unwrap().grid().is_none());
    assert!(fea.get("second").unwrap().grid().is_none());
    assert!(fea.get("third").unwrap().grid().is_some());
    assert_eq!(current_grid(&session, "fea").len(), 120);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_session_from_config_runs_all_exchanges() {
    let config = SessionConfig::from_json(
        r#"{
            "name": "round_trip",
            "retention": 3,
            "engines": ["fea", "tool"],
            "exchanges": [
                {"source": "fea", "target": "tool", "field": "pore_pressure",
                 "neighbors": {"count": 4}},
                {"source": "tool", "target": "fea", "field": "pore_pressure",
                 "neighbors": {"count": 1}}
            ]
        }"#,
    )
    .unwrap();

    let mut session = CouplingSession::from_config(&config).unwrap();
    assert_eq!(session.name(), "round_trip");
    assert_eq!(session.engine("fea").unwrap().retention(), 3);

    session.add_iteration_step("initial", &Carry::Nothing).unwrap();
    put_grid(&mut session, "fea", super::helpers::fea_grid(12));
    put_grid(&mut session, "tool", tool_grid());

    let summaries = session.exchange_all().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].written, 45);
    assert_eq!(summaries[1].written, 120);
}
