//! Solver-independent linear/integer program formulation.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::models::{Cargo, QuantityKind};

/// Which violation a slack variable absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// Unmet charged-bike demand at the station.
    StationFloor,
    /// Dock overflow at the station.
    StationCeiling,
    /// Charged stock short of outgoing demand before any return.
    ChargingFloor,
    /// Charged-slot overflow.
    ChargingCeiling,
}

impl ViolationKind {
    /// All violation kinds.
    pub const ALL: [ViolationKind; 4] = [
        ViolationKind::StationFloor,
        ViolationKind::StationCeiling,
        ViolationKind::ChargingFloor,
        ViolationKind::ChargingCeiling,
    ];
}

/// The role a variable plays in a formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// Master selection indicator for one (route, pattern) candidate.
    Select { candidate: usize },
    /// Operation quantity.
    Quantity(QuantityKind),
    /// In-transit vehicle load on arrival.
    Load(Cargo),
    /// Violation slack.
    Violation(ViolationKind),
    /// Flat-bike charging bonus (`r_F`).
    FlatBonus,
}

/// Typed variable identity: (kind, vehicle index, station index).
///
/// `station` is the canonical station index for per-stop variables and
/// `None` for per-vehicle ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarKey {
    pub kind: VarKind,
    pub vehicle: usize,
    pub station: Option<usize>,
}

impl VarKey {
    /// Key for a per-station variable.
    pub fn at(kind: VarKind, vehicle: usize, station: usize) -> Self {
        Self {
            kind,
            vehicle,
            station: Some(station),
        }
    }

    /// Key for a per-vehicle variable.
    pub fn vehicle(kind: VarKind, vehicle: usize) -> Self {
        Self {
            kind,
            vehicle,
            station: None,
        }
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VarKind::Select { candidate } => write!(f, "x_{candidate}")?,
            VarKind::Quantity(q) => write!(f, "q_{q:?}")?,
            VarKind::Load(c) => write!(f, "l_{c:?}")?,
            VarKind::Violation(v) => write!(f, "v_{v:?}")?,
            VarKind::FlatBonus => write!(f, "r_F")?,
        }
        match self.station {
            Some(s) => write!(f, "[v{},s{}]", self.vehicle, s),
            None => write!(f, "[v{}]", self.vehicle),
        }
    }
}

/// Handle to a variable inside one [`Formulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

impl VarId {
    /// Position in [`Formulation::variables`].
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Continuous,
    Integer,
    Binary,
}

/// A decision variable with bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    key: VarKey,
    domain: Domain,
    lower: f64,
    upper: Option<f64>,
}

impl Variable {
    pub fn key(&self) -> VarKey {
        self.key
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// Upper bound, `None` if unbounded.
    pub fn upper(&self) -> Option<f64> {
        self.upper
    }
}

/// `Σ coef·var + constant`.
///
/// # Examples
///
/// ```
/// use u_rebalance::optimizer::{Domain, Formulation, LinearExpr, Sense, VarKey, VarKind};
///
/// let mut f = Formulation::new("demo", Sense::Maximize);
/// let x = f.add_variable(VarKey::vehicle(VarKind::FlatBonus, 0), Domain::Continuous, 0.0, Some(4.0));
/// let expr = LinearExpr::constant(1.0).term(x, 2.0);
/// assert!((expr.evaluate(&[3.0]) - 7.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    /// The zero expression.
    pub fn new() -> Self {
        Self::default()
    }

    /// A constant expression.
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Adds `coef·var`, builder style.
    pub fn term(mut self, var: VarId, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    /// Adds `coef·var`.
    pub fn add_term(&mut self, var: VarId, coef: f64) {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
    }

    /// Adds to the constant.
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_value(&self) -> f64 {
        self.constant
    }

    /// Value under an assignment indexed by [`VarId`].
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, &(v, c)| acc + c * values[v.0])
    }
}

/// Constraint relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LessEq,
    GreaterEq,
    Equal,
}

/// `expr (<=|>=|=) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    expr: LinearExpr,
    comparison: Comparison,
    rhs: f64,
}

impl Constraint {
    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Returns `true` if the assignment satisfies this constraint within `tol`.
    pub fn is_satisfied(&self, values: &[f64], tol: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.comparison {
            Comparison::LessEq => lhs <= self.rhs + tol,
            Comparison::GreaterEq => lhs >= self.rhs - tol,
            Comparison::Equal => (lhs - self.rhs).abs() <= tol,
        }
    }
}

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

/// Variables, constraints, objective and an optional time budget.
///
/// Variables are registered under a unique [`VarKey`]; solvers return values
/// by position and [`Formulation::assignment`] maps them back to keys. An
/// optional incumbent is a known feasible assignment a backend may return
/// when its budget runs out.
#[derive(Debug, Clone)]
pub struct Formulation {
    name: String,
    sense: Sense,
    variables: Vec<Variable>,
    keys: HashMap<VarKey, VarId>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
    time_limit: Option<Duration>,
    incumbent: Option<Vec<f64>>,
}

impl Formulation {
    /// Creates an empty formulation.
    pub fn new(name: impl Into<String>, sense: Sense) -> Self {
        Self {
            name: name.into(),
            sense,
            variables: Vec::new(),
            keys: HashMap::new(),
            constraints: Vec::new(),
            objective: LinearExpr::new(),
            time_limit: None,
            incumbent: None,
        }
    }

    /// Sets the solve time budget.
    pub fn with_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    /// Registers a variable.
    ///
    /// Keys are unique within a formulation.
    pub fn add_variable(
        &mut self,
        key: VarKey,
        domain: Domain,
        lower: f64,
        upper: Option<f64>,
    ) -> VarId {
        let id = VarId(self.variables.len());
        let previous = self.keys.insert(key, id);
        debug_assert!(previous.is_none(), "duplicate variable {key}");
        self.variables.push(Variable {
            key,
            domain,
            lower,
            upper,
        });
        id
    }

    /// Looks up a variable by key.
    pub fn var(&self, key: &VarKey) -> Option<VarId> {
        self.keys.get(key).copied()
    }

    /// Adds `expr cmp rhs`.
    pub fn add_constraint(&mut self, expr: LinearExpr, comparison: Comparison, rhs: f64) {
        self.constraints.push(Constraint {
            expr,
            comparison,
            rhs,
        });
    }

    /// Adds `expr <= rhs`.
    pub fn add_le(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Comparison::LessEq, rhs);
    }

    /// Adds `expr >= rhs`.
    pub fn add_ge(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Comparison::GreaterEq, rhs);
    }

    /// Adds `expr = rhs`.
    pub fn add_eq(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Comparison::Equal, rhs);
    }

    /// Sets the objective.
    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    /// Attaches a positional assignment to fall back on.
    pub fn set_incumbent(&mut self, values: Vec<f64>) {
        self.incumbent = Some(values);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    pub fn incumbent(&self) -> Option<&[f64]> {
        self.incumbent.as_deref()
    }

    /// Returns `true` if a positional assignment respects every bound,
    /// domain and constraint within `tol`.
    pub fn is_feasible(&self, values: &[f64], tol: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let within_bounds = self.variables.iter().zip(values).all(|(v, &x)| {
            let upper = match v.domain {
                Domain::Binary => Some(1.0),
                _ => v.upper,
            };
            x.is_finite()
                && x >= v.lower - tol
                && upper.map_or(true, |u| x <= u + tol)
                && (v.domain == Domain::Continuous || (x - x.round()).abs() <= tol)
        });
        within_bounds && self.constraints.iter().all(|c| c.is_satisfied(values, tol))
    }

    /// Objective value of a positional assignment.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.evaluate(values)
    }

    /// Maps a positional assignment back to typed keys.
    pub fn assignment(&self, values: &[f64]) -> Assignment {
        let values = self
            .variables
            .iter()
            .zip(values)
            .map(|(v, &x)| (v.key, x))
            .collect();
        Assignment { values }
    }
}

/// Variable values keyed by [`VarKey`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    values: HashMap<VarKey, f64>,
}

impl Assignment {
    /// Creates an assignment from explicit values.
    pub fn from_values(values: impl IntoIterator<Item = (VarKey, f64)>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Value of the variable with the given key.
    pub fn get(&self, key: &VarKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Iterates over all (key, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&VarKey, &f64)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
