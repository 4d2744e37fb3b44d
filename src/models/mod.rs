//! Domain model types for fleet rebalancing.
//!
//! Provides the core abstractions: stations with inventories and demand
//! rates, vehicles with cargo, loop-free routes with loading patterns,
//! demand scenarios, and the per-vehicle plans a run produces.

mod route;
mod scenario;
mod solution;
mod station;
mod vehicle;

pub use route::{LoadingMode, Pattern, Route};
pub use scenario::{DemandCounts, Scenario, ScenarioSet, StationEvents};
pub use solution::{MasterSolution, Quantities, QuantityKind, VehiclePlan};
pub use station::{DemandType, Station, StationIndex};
pub use vehicle::{Cargo, Vehicle};
