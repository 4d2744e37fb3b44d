//! Error taxonomy for planning runs.
//!
//! Fatal kinds are returned as `Err` from the pipeline. Non-fatal kinds
//! ([`PlanningError::SubproblemInfeasible`], [`PlanningError::OptimizerTimeLimit`])
//! are collected as warnings on the outcome so the run keeps progressing.

use std::fmt;

use thiserror::Error;

/// Identifies one scored (vehicle, route, pattern, scenario) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoringContext {
    /// Vehicle position in the fleet snapshot.
    pub vehicle: usize,
    /// Route index within the vehicle's candidates.
    pub route: usize,
    /// Pattern index within the route.
    pub pattern: usize,
    /// Scenario index.
    pub scenario: usize,
}

impl fmt::Display for ScoringContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vehicle {} route {} pattern {} scenario {}",
            self.vehicle, self.route, self.pattern, self.scenario
        )
    }
}

/// Pipeline stage an optimizer call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// A per-(route, pattern, scenario) allocation subproblem.
    Subproblem(ScoringContext),
    /// The fleet-wide selection problem.
    Master,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Subproblem(ctx) => write!(f, "subproblem ({ctx})"),
            Stage::Master => write!(f, "master problem"),
        }
    }
}

/// Errors raised while planning a rebalancing run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    /// Invalid rates, capacities, loads or configuration values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A subproblem had no feasible allocation; scored with the sentinel.
    #[error("subproblem infeasible for {context}: {reason}")]
    SubproblemInfeasible {
        /// Which combination failed.
        context: ScoringContext,
        /// Optimizer-reported reason.
        reason: String,
    },

    /// The optimizer hit its time budget; its best-found result was used.
    #[error("optimizer time limit reached in {stage}")]
    OptimizerTimeLimit {
        /// Where the limit was hit.
        stage: Stage,
    },

    /// No fleet-wide plan exists.
    #[error("master problem infeasible: {reason}")]
    InfeasibleMasterProblem {
        /// Optimizer-reported reason.
        reason: String,
    },

    /// A selection indicator or quantity fell outside its expected domain.
    #[error("malformed solution data for vehicle {vehicle}: {detail}")]
    MalformedSolutionData {
        /// Vehicle position in the fleet snapshot.
        vehicle: usize,
        /// What was wrong.
        detail: String,
    },
}

impl PlanningError {
    /// Returns `true` for kinds that abort a run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlanningError::Configuration(_)
                | PlanningError::InfeasibleMasterProblem { .. }
                | PlanningError::MalformedSolutionData { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let ctx = ScoringContext {
            vehicle: 1,
            route: 2,
            pattern: 3,
            scenario: 4,
        };
        assert_eq!(ctx.to_string(), "vehicle 1 route 2 pattern 3 scenario 4");
    }

    #[test]
    fn test_fatal_classification() {
        let ctx = ScoringContext {
            vehicle: 0,
            route: 0,
            pattern: 0,
            scenario: 0,
        };
        assert!(PlanningError::Configuration("x".into()).is_fatal());
        assert!(PlanningError::InfeasibleMasterProblem { reason: "x".into() }.is_fatal());
        assert!(PlanningError::MalformedSolutionData {
            vehicle: 0,
            detail: "x".into()
        }
        .is_fatal());
        assert!(!PlanningError::SubproblemInfeasible {
            context: ctx,
            reason: "x".into()
        }
        .is_fatal());
        assert!(!PlanningError::OptimizerTimeLimit {
            stage: Stage::Master
        }
        .is_fatal());
    }

    #[test]
    fn test_error_message_carries_context() {
        let err = PlanningError::OptimizerTimeLimit {
            stage: Stage::Subproblem(ScoringContext {
                vehicle: 2,
                route: 0,
                pattern: 1,
                scenario: 5,
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("vehicle 2"));
        assert!(msg.contains("scenario 5"));
    }
}
