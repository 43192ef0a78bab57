//! Test module for session integration and determinism tests.
//!
//! - `integration.rs`: multi-iteration runs with exchanges between engines
//! - `determinism.rs`: identical inputs produce bit-identical grids
//! - `helpers.rs`: session setup and grid factories

mod helpers;
mod integration;

pub use helpers::*;
