//! Subproblem scoring.
//!
//! - [`SubproblemEvaluator`] — Allocation program per (vehicle, route, pattern, scenario)
//! - [`ScoreTable`] — Scores of one vehicle's candidates, `[route][pattern][scenario]`

mod score_table;
mod subproblem;

pub use score_table::ScoreTable;
pub use subproblem::{SubproblemEvaluator, SubproblemOutcome, ViolationSummary, INFEASIBLE_SCORE};
