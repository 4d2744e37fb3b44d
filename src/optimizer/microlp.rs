//! `good_lp` backend using the pure-Rust `microlp` solver.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use good_lp::solvers::microlp::microlp;
use good_lp::{variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel};
use tracing::{debug, trace};

use super::{
    Comparison, Domain, Formulation, LinearExpr, Optimizer, OptimizerResult, Sense, SolveStatus,
    Variable,
};

/// Solves formulations with `microlp` through `good_lp`.
///
/// Without a time limit the solve runs on the calling thread. With one, it
/// runs on a worker thread and the caller waits at most the budget; on expiry
/// the formulation's incumbent is returned as
/// [`SolveStatus::TimeLimitReached`] if it is feasible, and no values
/// otherwise. `microlp` cannot be interrupted, so an abandoned solve finishes
/// in the background and its result is dropped.
///
/// # Examples
///
/// ```
/// use u_rebalance::optimizer::{
///     Domain, Formulation, LinearExpr, MicroLpOptimizer, Optimizer, Sense, SolveStatus, VarKey, VarKind,
/// };
///
/// let mut f = Formulation::new("demo", Sense::Maximize);
/// let x = f.add_variable(VarKey::vehicle(VarKind::FlatBonus, 0), Domain::Continuous, 0.0, None);
/// f.add_le(LinearExpr::new().term(x, 2.0), 6.0);
/// f.set_objective(LinearExpr::new().term(x, 1.0));
///
/// let result = MicroLpOptimizer::new().solve(&f);
/// assert_eq!(result.status, SolveStatus::Optimal);
/// assert!((result.objective.unwrap() - 3.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLpOptimizer;

impl MicroLpOptimizer {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

/// Tolerance for accepting an incumbent.
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

impl Optimizer for MicroLpOptimizer {
    fn solve(&self, formulation: &Formulation) -> OptimizerResult {
        let Some(limit) = formulation.time_limit() else {
            return solve_now(formulation);
        };
        let job = formulation.clone();
        match run_with_deadline(limit, move || solve_now(&job)) {
            Deadline::Finished(result) => result,
            Deadline::Expired => {
                debug!(
                    formulation = formulation.name(),
                    limit_ms = limit.as_millis() as u64,
                    "microlp solve abandoned at time limit"
                );
                best_found(formulation)
            }
            Deadline::Lost(reason) => OptimizerResult::failed(SolveStatus::Error(reason)),
        }
    }
}

/// How a job run against a deadline ended.
#[derive(Debug)]
enum Deadline<T> {
    Finished(T),
    Expired,
    Lost(String),
}

/// Runs `job` on its own thread and waits at most `limit` for it.
fn run_with_deadline<T, F>(limit: Duration, job: F) -> Deadline<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("microlp-solve".into())
        .spawn(move || {
            // The receiver is gone once the deadline passed.
            let _ = tx.send(job());
        });
    if let Err(e) = spawned {
        return Deadline::Lost(format!("cannot start solver thread: {e}"));
    }
    match rx.recv_timeout(limit) {
        Ok(value) => Deadline::Finished(value),
        Err(RecvTimeoutError::Timeout) => Deadline::Expired,
        Err(RecvTimeoutError::Disconnected) => Deadline::Lost("solver thread panicked".to_string()),
    }
}

/// The incumbent as a time-limited result, if it is feasible.
fn best_found(formulation: &Formulation) -> OptimizerResult {
    match formulation.incumbent() {
        Some(values) if formulation.is_feasible(values, FEASIBILITY_TOLERANCE) => {
            OptimizerResult::solved(
                SolveStatus::TimeLimitReached,
                formulation.objective_value(values),
                formulation.assignment(values),
            )
        }
        _ => OptimizerResult::failed(SolveStatus::TimeLimitReached),
    }
}

fn solve_now(formulation: &Formulation) -> OptimizerResult {
    let started = Instant::now();

    let mut vars = ProblemVariables::new();
    let handles: Vec<good_lp::Variable> = formulation
        .variables()
        .iter()
        .map(|v| vars.add(definition(v)))
        .collect();

    let objective = to_expression(formulation.objective(), &handles);
    let unsolved = match formulation.sense() {
        Sense::Maximize => vars.maximise(objective),
        Sense::Minimize => vars.minimise(objective),
    };
    let mut model = unsolved.using(microlp);

    for c in formulation.constraints() {
        let lhs = to_expression(c.expr(), &handles);
        let constraint = match c.comparison() {
            Comparison::LessEq => lhs.leq(c.rhs()),
            Comparison::GreaterEq => lhs.geq(c.rhs()),
            Comparison::Equal => lhs.eq(c.rhs()),
        };
        model.add_constraint(constraint);
    }

    let outcome = model.solve();
    let elapsed = started.elapsed();
    trace!(
        formulation = formulation.name(),
        variables = handles.len(),
        constraints = formulation.constraints().len(),
        elapsed_us = elapsed.as_micros() as u64,
        "microlp solve finished"
    );

    match outcome {
        Ok(solution) => {
            let values: Vec<f64> = handles.iter().map(|&h| solution.value(h)).collect();
            OptimizerResult::solved(
                SolveStatus::Optimal,
                formulation.objective_value(&values),
                formulation.assignment(&values),
            )
        }
        Err(ResolutionError::Infeasible) => OptimizerResult::failed(SolveStatus::Infeasible),
        Err(ResolutionError::Unbounded) => {
            OptimizerResult::failed(SolveStatus::Error("problem is unbounded".to_string()))
        }
        Err(e) => OptimizerResult::failed(SolveStatus::Error(e.to_string())),
    }
}

fn definition(v: &Variable) -> good_lp::VariableDefinition {
    let def = variable().name(v.key().to_string());
    if v.domain() == Domain::Binary {
        return def.binary();
    }
    let mut def = def.min(v.lower());
    if let Some(upper) = v.upper() {
        def = def.max(upper);
    }
    if v.domain() == Domain::Integer {
        def = def.integer();
    }
    def
}

fn to_expression(expr: &LinearExpr, handles: &[good_lp::Variable]) -> Expression {
    expr.terms()
        .iter()
        .fold(Expression::from(expr.constant_value()), |acc, &(var, coef)| {
            acc + coef * handles[var.index()]
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuantityKind;
    use crate::optimizer::{VarKey, VarKind};
    use std::time::Duration;

    fn key(i: usize) -> VarKey {
        VarKey::at(VarKind::Quantity(QuantityKind::BatterySwap), 0, i)
    }

    #[test]
    fn test_lp_optimum() {
        // max 3x + 2y s.t. x + y <= 4, x + 3y <= 6, x <= 3
        let mut f = Formulation::new("lp", Sense::Maximize);
        let x = f.add_variable(key(0), Domain::Continuous, 0.0, Some(3.0));
        let y = f.add_variable(key(1), Domain::Continuous, 0.0, None);
        f.add_le(LinearExpr::new().term(x, 1.0).term(y, 1.0), 4.0);
        f.add_le(LinearExpr::new().term(x, 1.0).term(y, 3.0), 6.0);
        f.set_objective(LinearExpr::new().term(x, 3.0).term(y, 2.0));

        let r = MicroLpOptimizer::new().solve(&f);
        assert_eq!(r.status, SolveStatus::Optimal);
        assert!((r.objective.expect("solved") - 11.0).abs() < 1e-6);
        let a = r.assignment.expect("solved");
        assert!((a.get(&key(0)).expect("x") - 3.0).abs() < 1e-6);
        assert!((a.get(&key(1)).expect("y") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_constant_in_objective() {
        let mut f = Formulation::new("const", Sense::Maximize);
        let x = f.add_variable(key(0), Domain::Continuous, 0.0, Some(1.0));
        f.set_objective(LinearExpr::constant(10.0).term(x, 1.0));
        let r = MicroLpOptimizer::new().solve(&f);
        assert!((r.objective.expect("solved") - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_binary_selection() {
        // pick exactly one of three with weights 1, 5, 3
        let mut f = Formulation::new("select", Sense::Maximize);
        let xs: Vec<_> = (0..3)
            .map(|i| f.add_variable(key(i), Domain::Binary, 0.0, Some(1.0)))
            .collect();
        let mut sum = LinearExpr::new();
        for &x in &xs {
            sum.add_term(x, 1.0);
        }
        f.add_eq(sum, 1.0);
        f.set_objective(
            LinearExpr::new()
                .term(xs[0], 1.0)
                .term(xs[1], 5.0)
                .term(xs[2], 3.0),
        );
        let r = MicroLpOptimizer::new().solve(&f);
        assert_eq!(r.status, SolveStatus::Optimal);
        let a = r.assignment.expect("solved");
        assert!((a.get(&key(1)).expect("x1") - 1.0).abs() < 1e-6);
        assert!(a.get(&key(0)).expect("x0").abs() < 1e-6);
    }

    #[test]
    fn test_infeasible() {
        let mut f = Formulation::new("infeasible", Sense::Minimize);
        let x = f.add_variable(key(0), Domain::Continuous, 0.0, Some(1.0));
        f.add_ge(LinearExpr::new().term(x, 1.0), 2.0);
        f.set_objective(LinearExpr::new().term(x, 1.0));
        let r = MicroLpOptimizer::new().solve(&f);
        assert_eq!(r.status, SolveStatus::Infeasible);
        assert!(!r.has_values());
    }

    #[test]
    fn test_unbounded_is_error() {
        let mut f = Formulation::new("unbounded", Sense::Maximize);
        let x = f.add_variable(key(0), Domain::Continuous, 0.0, None);
        f.set_objective(LinearExpr::new().term(x, 1.0));
        let r = MicroLpOptimizer::new().solve(&f);
        assert!(matches!(r.status, SolveStatus::Error(_)));
    }

    #[test]
    fn test_deadline_abandons_slow_job() {
        let started = Instant::now();
        let outcome = run_with_deadline(Duration::from_millis(20), || {
            thread::sleep(Duration::from_secs(5));
            1
        });
        assert!(matches!(outcome, Deadline::Expired));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_deadline_returns_fast_job() {
        let outcome = run_with_deadline(Duration::from_secs(10), || 7);
        assert!(matches!(outcome, Deadline::Finished(7)));
    }

    #[test]
    fn test_deadline_reports_panicked_job() {
        let outcome: Deadline<()> =
            run_with_deadline(Duration::from_secs(10), || panic!("solver blew up"));
        assert!(matches!(outcome, Deadline::Lost(_)));
    }

    fn with_incumbent(values: Vec<f64>) -> Formulation {
        let mut f = Formulation::new("fallback", Sense::Maximize);
        let x = f.add_variable(key(0), Domain::Integer, 0.0, Some(5.0));
        f.add_le(LinearExpr::new().term(x, 1.0), 4.0);
        f.set_objective(LinearExpr::constant(1.0).term(x, 2.0));
        f.set_incumbent(values);
        f
    }

    #[test]
    fn test_expired_returns_feasible_incumbent() {
        let r = best_found(&with_incumbent(vec![3.0]));
        assert_eq!(r.status, SolveStatus::TimeLimitReached);
        assert!((r.objective.expect("incumbent") - 7.0).abs() < 1e-10);
        assert_eq!(r.assignment.expect("incumbent").get(&key(0)), Some(3.0));
    }

    #[test]
    fn test_expired_rejects_infeasible_incumbent() {
        let r = best_found(&with_incumbent(vec![4.5]));
        assert_eq!(r.status, SolveStatus::TimeLimitReached);
        assert!(!r.has_values());

        let mut bare = Formulation::new("bare", Sense::Maximize);
        bare.add_variable(key(0), Domain::Continuous, 0.0, None);
        assert!(!best_found(&bare).has_values());
    }

    #[test]
    fn test_generous_time_limit_is_optimal() {
        let mut f = Formulation::new("timed", Sense::Maximize)
            .with_time_limit(Some(Duration::from_secs(60)));
        let x = f.add_variable(key(0), Domain::Continuous, 0.0, Some(2.0));
        f.set_objective(LinearExpr::new().term(x, 1.0));
        let r = MicroLpOptimizer::new().solve(&f);
        assert_eq!(r.status, SolveStatus::Optimal);
    }
}
