//! Planning run orchestration.
//!
//! - [`HeuristicManager`] — Scenarios → candidates → parallel scoring → master → extraction

mod manager;

pub use manager::{HeuristicManager, PlanningOutcome};
