//! Optimizer collaborator interface.
//!
//! - [`Formulation`] — Typed variables, linear constraints, objective, time budget
//! - [`Optimizer`] — Formulate → solve → typed status and assignment
//! - [`MicroLpOptimizer`] — Backend built on `good_lp` with the pure-Rust `microlp` solver

mod formulation;
mod microlp;

pub use formulation::{
    Assignment, Comparison, Constraint, Domain, Formulation, LinearExpr, Sense, VarId, VarKey,
    VarKind, Variable, ViolationKind,
};
pub use microlp::MicroLpOptimizer;

/// Outcome class of a solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Stopped at the time budget with a best-found assignment.
    TimeLimitReached,
    /// No feasible assignment exists.
    Infeasible,
    /// The backend failed.
    Error(String),
}

/// What an [`Optimizer`] returns.
///
/// `objective` and `assignment` are present whenever the backend produced
/// values (always for `Optimal`, possibly for `TimeLimitReached`).
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerResult {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub assignment: Option<Assignment>,
}

impl OptimizerResult {
    /// A result carrying values.
    pub fn solved(status: SolveStatus, objective: f64, assignment: Assignment) -> Self {
        Self {
            status,
            objective: Some(objective),
            assignment: Some(assignment),
        }
    }

    /// A result with no values.
    pub fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            objective: None,
            assignment: None,
        }
    }

    /// Returns `true` if the solve produced usable values.
    pub fn has_values(&self) -> bool {
        self.objective.is_some() && self.assignment.is_some()
    }
}

/// A linear/integer programming backend.
///
/// Implementations must honor the formulation's time limit as well as they
/// can and report a best-found result rather than block indefinitely.
pub trait Optimizer: Send + Sync {
    /// Solves the formulation.
    fn solve(&self, formulation: &Formulation) -> OptimizerResult;
}

impl<O: Optimizer + ?Sized> Optimizer for &O {
    fn solve(&self, formulation: &Formulation) -> OptimizerResult {
        (**self).solve(formulation)
    }
}
