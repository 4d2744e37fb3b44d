//! Stochastic customer demand.
//!
//! - [`ScenarioGenerator`] — Poisson event timelines per station and demand type

mod generator;

pub use generator::ScenarioGenerator;
