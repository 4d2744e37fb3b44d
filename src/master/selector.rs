//! Fleet-wide candidate selection.
//!
//! One binary indicator per (vehicle, candidate). Quantities at the realized
//! target are per-vehicle integers whose bounds switch with the selected
//! candidate: every bound is written as `Σ_c x_c · bound_c`, which collapses
//! to the chosen candidate's bound because exactly one `x_c` is 1.
//!
//! Every vehicle's idle candidate, with nothing moved, is attached as the
//! incumbent a time-limited backend may fall back to.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{MasterConfig, RewardConfig};
use crate::error::{PlanningError, Stage};
use crate::evaluation::ScoreTable;
use crate::generation::RouteCandidates;
use crate::models::{Cargo, Pattern, QuantityKind, ScenarioSet, Station, Vehicle};
use crate::optimizer::{
    Assignment, Domain, Formulation, LinearExpr, Optimizer, OptimizerResult, Sense, SolveStatus,
    VarId, VarKey, VarKind, ViolationKind,
};

/// One selectable (route, pattern) for a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterCandidate {
    /// Route index within the vehicle's candidates.
    pub route: usize,
    /// Pattern index within the route.
    pub pattern: usize,
    /// Loading pattern.
    pub loading: Pattern,
    /// Canonical index of the station the vehicle drives to next.
    pub target: usize,
    /// Mean score improvement over the idle pattern of the same route.
    pub expected_gain: f64,
}

impl MasterCandidate {
    /// Flattens a vehicle's routes and scores into selectable candidates.
    ///
    /// Idle candidates target the vehicle's current station `start` and gain
    /// 0; every other pattern is valued by its gain over the route's idle
    /// pattern, or by its plain expected score on a route without one.
    pub fn enumerate(start: usize, routes: &[RouteCandidates], table: &ScoreTable) -> Vec<Self> {
        let mut out = Vec::new();
        for (r, rc) in routes.iter().enumerate() {
            let baseline = rc.patterns.iter().position(|p| p.is_idle());
            for (p, &loading) in rc.patterns.iter().enumerate() {
                let target = if loading.is_idle() {
                    start
                } else {
                    rc.route.target().unwrap_or(start)
                };
                out.push(Self {
                    route: r,
                    pattern: p,
                    loading,
                    target,
                    expected_gain: match baseline {
                        Some(b) => table.expected_gain(r, p, b),
                        None => table.expected(r, p),
                    },
                });
            }
        }
        out
    }

    /// Key of this candidate's selection indicator.
    pub fn key(&self, vehicle: usize, candidate: usize) -> VarKey {
        VarKey::at(VarKind::Select { candidate }, vehicle, self.target)
    }
}

/// Solved master problem, ready for extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterAssignment {
    pub assignment: Assignment,
    pub objective: f64,
    /// `false` when the solve stopped at its time limit.
    pub optimal: bool,
    pub warning: Option<PlanningError>,
}

/// Builds and solves the selection program.
///
/// # Examples
///
/// ```
/// use u_rebalance::config::{MasterConfig, RewardConfig};
/// use u_rebalance::master::{MasterCandidate, MasterSelector};
/// use u_rebalance::models::{LoadingMode, Pattern, ScenarioSet, Station, Vehicle};
/// use u_rebalance::optimizer::MicroLpOptimizer;
///
/// let stations = vec![Station::new(0, 10), Station::new(1, 10)];
/// let vehicles = vec![Vehicle::new(0, 0)];
/// let candidates = vec![vec![
///     MasterCandidate { route: 0, pattern: 0, loading: Pattern::idle(), target: 0, expected_gain: -2.0 },
///     MasterCandidate { route: 0, pattern: 1, loading: Pattern::new(LoadingMode::Full), target: 1, expected_gain: 1.0 },
/// ]];
///
/// let (reward, config) = (RewardConfig::default(), MasterConfig::default());
/// let optimizer = MicroLpOptimizer::new();
/// let selector = MasterSelector::new(&stations, &reward, &config, &optimizer);
/// let solved = selector.select(&vehicles, &candidates, &ScenarioSet::new(1, vec![])).unwrap();
///
/// let chosen = candidates[0][1].key(0, 1);
/// assert!((solved.assignment.get(&chosen).unwrap() - 1.0).abs() < 1e-6);
/// ```
pub struct MasterSelector<'a, O: ?Sized> {
    stations: &'a [Station],
    reward: &'a RewardConfig,
    config: &'a MasterConfig,
    optimizer: &'a O,
    time_limit: Option<Duration>,
}

impl<'a, O: Optimizer + ?Sized> MasterSelector<'a, O> {
    pub fn new(
        stations: &'a [Station],
        reward: &'a RewardConfig,
        config: &'a MasterConfig,
        optimizer: &'a O,
    ) -> Self {
        Self {
            stations,
            reward,
            config,
            optimizer,
            time_limit: None,
        }
    }

    /// Sets the solve time budget.
    pub fn with_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    /// Builds the selection program.
    ///
    /// `candidates[v]` lists vehicle `v`'s candidates; vehicles with none get
    /// no variables.
    pub fn formulate(
        &self,
        vehicles: &[Vehicle],
        candidates: &[Vec<MasterCandidate>],
        scenarios: &ScenarioSet,
    ) -> Formulation {
        let mut f = Formulation::new("master", Sense::Maximize).with_time_limit(self.time_limit);
        let mut objective = LinearExpr::new();
        // (station, indicator) of every non-idle candidate, for exclusivity.
        let mut claims: Vec<(usize, VarId)> = Vec::new();

        for (v, (vehicle, cands)) in vehicles.iter().zip(candidates).enumerate() {
            if cands.is_empty() {
                continue;
            }

            let xs: Vec<VarId> = cands
                .iter()
                .enumerate()
                .map(|(c, cand)| f.add_variable(cand.key(v, c), Domain::Binary, 0.0, Some(1.0)))
                .collect();

            let mut one = LinearExpr::new();
            for (&x, cand) in xs.iter().zip(cands) {
                one.add_term(x, 1.0);
                objective.add_term(x, cand.expected_gain);
                if !cand.loading.is_idle() {
                    claims.push((cand.target, x));
                }
            }
            f.add_eq(one, 1.0);

            self.add_vehicle_rows(&mut f, &mut objective, v, vehicle, cands, &xs, scenarios);
        }

        if self.config.exclusive_targets {
            for s in 0..self.stations.len() {
                let mut claim = LinearExpr::new();
                let mut count = 0;
                for &(_, x) in claims.iter().filter(|(t, _)| *t == s) {
                    claim.add_term(x, 1.0);
                    count += 1;
                }
                if count > 1 {
                    f.add_le(claim, 1.0);
                }
            }
        }

        f.set_objective(objective);
        if let Some(values) = idle_incumbent(self.stations, &f, candidates, scenarios) {
            f.set_incumbent(values);
        }
        f
    }

    #[allow(clippy::too_many_arguments)]
    fn add_vehicle_rows(
        &self,
        f: &mut Formulation,
        objective: &mut LinearExpr,
        v: usize,
        vehicle: &Vehicle,
        cands: &[MasterCandidate],
        xs: &[VarId],
        scenarios: &ScenarioSet,
    ) {
        let qs = QuantityKind::ALL.map(|kind| {
            f.add_variable(
                VarKey::vehicle(VarKind::Quantity(kind), v),
                Domain::Integer,
                0.0,
                None,
            )
        });
        let q = |kind: QuantityKind| qs[kind as usize];

        // Σ_c x_c · g(candidate), subtracted from `expr`.
        let switched = |mut expr: LinearExpr, g: &dyn Fn(&MasterCandidate, &Station) -> f64| {
            for (&x, cand) in xs.iter().zip(cands) {
                expr.add_term(x, -g(cand, &self.stations[cand.target]));
            }
            expr
        };

        let free = f64::from(vehicle.free_bike_slots());
        let battery = f64::from(vehicle.load(Cargo::Battery));
        let charged_on_board = f64::from(vehicle.load(Cargo::ChargedBike));
        let flat_on_board = f64::from(vehicle.load(Cargo::FlatBike));

        for kind in QuantityKind::ALL {
            let bound = move |cand: &MasterCandidate, s: &Station| -> f64 {
                if !cand.loading.allows(kind) {
                    return 0.0;
                }
                match kind {
                    QuantityKind::BatterySwap if s.is_depot() => 0.0,
                    QuantityKind::BatterySwap => battery.min(f64::from(s.flat_load())),
                    QuantityKind::ChargedPickup => free.min(f64::from(s.charged_load())),
                    QuantityKind::FlatPickup => free.min(f64::from(s.flat_load())),
                    QuantityKind::ChargedDelivery => charged_on_board,
                    QuantityKind::FlatDelivery => flat_on_board,
                }
            };
            f.add_le(switched(LinearExpr::new().term(q(kind), 1.0), &bound), 0.0);
        }

        // Bikes on board after the stop fit the vehicle.
        f.add_le(
            LinearExpr::new()
                .term(q(QuantityKind::ChargedPickup), 1.0)
                .term(q(QuantityKind::FlatPickup), 1.0)
                .term(q(QuantityKind::ChargedDelivery), -1.0)
                .term(q(QuantityKind::FlatDelivery), -1.0),
            free,
        );

        let charged_gain = LinearExpr::new()
            .term(q(QuantityKind::BatterySwap), 1.0)
            .term(q(QuantityKind::ChargedDelivery), 1.0)
            .term(q(QuantityKind::ChargedPickup), -1.0);
        let net_bikes = LinearExpr::new()
            .term(q(QuantityKind::ChargedDelivery), 1.0)
            .term(q(QuantityKind::FlatDelivery), 1.0)
            .term(q(QuantityKind::ChargedPickup), -1.0)
            .term(q(QuantityKind::FlatPickup), -1.0);

        // Target station slots.
        f.add_le(
            switched(net_bikes.clone(), &|_: &MasterCandidate, s: &Station| {
                f64::from(s.capacity()) - f64::from(s.charged_load()) - f64::from(s.flat_load())
            }),
            0.0,
        );
        f.add_le(
            switched(charged_gain.clone(), &|_: &MasterCandidate, s: &Station| {
                f64::from(s.charged_capacity()) - f64::from(s.charged_load())
            }),
            0.0,
        );
        f.add_le(
            switched(
                LinearExpr::new()
                    .term(q(QuantityKind::FlatDelivery), 1.0)
                    .term(q(QuantityKind::FlatPickup), -1.0)
                    .term(q(QuantityKind::BatterySwap), -1.0),
                &|_: &MasterCandidate, s: &Station| f64::from(s.flat_capacity()) - f64::from(s.flat_load()),
            ),
            0.0,
        );
        f.add_le(
            switched(
                LinearExpr::new()
                    .term(q(QuantityKind::BatterySwap), 1.0)
                    .term(q(QuantityKind::FlatPickup), 1.0)
                    .term(q(QuantityKind::FlatDelivery), -1.0),
                &|_: &MasterCandidate, s: &Station| f64::from(s.flat_load()),
            ),
            0.0,
        );

        // Expected-demand slacks at the target.
        let floor = f.add_variable(
            VarKey::vehicle(VarKind::Violation(ViolationKind::StationFloor), v),
            Domain::Continuous,
            0.0,
            None,
        );
        let ceiling = f.add_variable(
            VarKey::vehicle(VarKind::Violation(ViolationKind::StationCeiling), v),
            Domain::Continuous,
            0.0,
            None,
        );
        let stock =
            |cand: &MasterCandidate, _: &Station| expected_stock(self.stations, cand, scenarios);
        // q_B + q_CCU - q_CCL + v_SF + stock >= 0, written as -(...) <= 0.
        let mut floor_row = LinearExpr::new();
        for &(var, coef) in charged_gain.terms() {
            floor_row.add_term(var, -coef);
        }
        floor_row.add_term(floor, -1.0);
        f.add_le(switched(floor_row, &|c: &MasterCandidate, s: &Station| stock(c, s).0), 0.0);

        let mut ceiling_row = net_bikes;
        ceiling_row.add_term(ceiling, -1.0);
        f.add_le(switched(ceiling_row, &|c: &MasterCandidate, s: &Station| -stock(c, s).1), 0.0);

        // Flat bonus: delivered flat bikes at a charging target.
        let bonus = f.add_variable(
            VarKey::vehicle(VarKind::FlatBonus, v),
            Domain::Continuous,
            0.0,
            None,
        );
        f.add_le(
            LinearExpr::new()
                .term(bonus, 1.0)
                .term(q(QuantityKind::FlatDelivery), -1.0),
            0.0,
        );
        f.add_le(
            switched(LinearExpr::new().term(bonus, 1.0), &|_: &MasterCandidate, s: &Station| {
                if s.is_charging() {
                    flat_on_board
                } else {
                    0.0
                }
            }),
            0.0,
        );

        let w = self.config.quantity_weight;
        objective.add_term(bonus, w * self.reward.w_r);
        objective.add_term(floor, -0.5 * w * self.reward.w_v);
        objective.add_term(ceiling, -0.5 * w * self.reward.w_v);
    }

    /// Formulates and solves the selection.
    ///
    /// A time-limited solve that returns no values of its own usually comes
    /// back with the idle incumbent.
    ///
    /// # Errors
    ///
    /// [`PlanningError::InfeasibleMasterProblem`] when the optimizer reports
    /// infeasibility, fails, or stops at its time limit without a solution.
    pub fn select(
        &self,
        vehicles: &[Vehicle],
        candidates: &[Vec<MasterCandidate>],
        scenarios: &ScenarioSet,
    ) -> Result<MasterAssignment, PlanningError> {
        let formulation = self.formulate(vehicles, candidates, scenarios);
        debug!(
            variables = formulation.variables().len(),
            constraints = formulation.constraints().len(),
            "solving master problem"
        );

        let OptimizerResult {
            status,
            objective,
            assignment,
        } = self.optimizer.solve(&formulation);

        match (status, objective, assignment) {
            (SolveStatus::Optimal, Some(objective), Some(assignment)) => Ok(MasterAssignment {
                assignment,
                objective,
                optimal: true,
                warning: None,
            }),
            (SolveStatus::TimeLimitReached, Some(objective), Some(assignment)) => {
                warn!(objective, "master problem stopped at its time limit");
                Ok(MasterAssignment {
                    assignment,
                    objective,
                    optimal: false,
                    warning: Some(PlanningError::OptimizerTimeLimit {
                        stage: Stage::Master,
                    }),
                })
            }
            (status, _, _) => {
                let reason = match status {
                    SolveStatus::Infeasible => "no feasible selection".to_string(),
                    SolveStatus::Error(msg) => msg,
                    SolveStatus::TimeLimitReached => {
                        "time limit reached without a feasible selection".to_string()
                    }
                    SolveStatus::Optimal => "optimizer returned no values".to_string(),
                };
                Err(PlanningError::InfeasibleMasterProblem { reason })
            }
        }
    }
}

/// Expected charged surplus and dock overflow at a candidate's target,
/// before any quantity moves.
fn expected_stock(stations: &[Station], cand: &MasterCandidate, scenarios: &ScenarioSet) -> (f64, f64) {
    let s = &stations[cand.target];
    let demand = scenarios.expected_counts(cand.target);
    let charged = f64::from(s.charged_load());
    (
        charged + demand.incoming_charged - demand.outgoing_charged,
        charged + f64::from(s.flat_load()) + demand.incoming_charged + demand.incoming_flat
            - demand.outgoing_charged
            - f64::from(s.capacity()),
    )
}

/// Every vehicle idle, slacks at their minimum. `None` when some vehicle
/// with candidates has no idle one.
fn idle_incumbent(
    stations: &[Station],
    f: &Formulation,
    candidates: &[Vec<MasterCandidate>],
    scenarios: &ScenarioSet,
) -> Option<Vec<f64>> {
    let mut values = vec![0.0; f.variables().len()];
    for (v, cands) in candidates.iter().enumerate() {
        if cands.is_empty() {
            continue;
        }
        let c = cands.iter().position(|cand| cand.loading.is_idle())?;
        let cand = &cands[c];
        values[f.var(&cand.key(v, c))?.index()] = 1.0;

        let (surplus, overflow) = expected_stock(stations, cand, scenarios);
        let floor = VarKey::vehicle(VarKind::Violation(ViolationKind::StationFloor), v);
        let ceiling = VarKey::vehicle(VarKind::Violation(ViolationKind::StationCeiling), v);
        values[f.var(&floor)?.index()] = (-surplus).max(0.0);
        values[f.var(&ceiling)?.index()] = overflow.max(0.0);
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DemandType, LoadingMode, Route, Scenario, StationEvents};
    use crate::optimizer::MicroLpOptimizer;

    struct FixedStatus(SolveStatus);

    impl Optimizer for FixedStatus {
        fn solve(&self, _formulation: &Formulation) -> OptimizerResult {
            OptimizerResult::failed(self.0.clone())
        }
    }

    struct SlowBackend;

    impl Optimizer for SlowBackend {
        fn solve(&self, formulation: &Formulation) -> OptimizerResult {
            let mut result = MicroLpOptimizer::new().solve(formulation);
            result.status = SolveStatus::TimeLimitReached;
            result
        }
    }

    fn cand(pattern: usize, mode: LoadingMode, target: usize, score: f64) -> MasterCandidate {
        MasterCandidate {
            route: 0,
            pattern,
            loading: Pattern::new(mode),
            target,
            expected_gain: score,
        }
    }

    fn no_scenarios() -> ScenarioSet {
        ScenarioSet::new(1, vec![])
    }

    fn value(a: &MasterAssignment, key: VarKey) -> f64 {
        a.assignment.get(&key).expect("present")
    }

    #[test]
    fn test_enumerate_targets() {
        let routes = vec![RouteCandidates {
            route: Route::from_stations(vec![3, 1]).expect("valid"),
            patterns: vec![Pattern::idle(), Pattern::new(LoadingMode::Full)],
        }];
        let table = ScoreTable::new(vec![vec![vec![1.0, 3.0], vec![4.0, 6.0]]]);
        let cands = MasterCandidate::enumerate(3, &routes, &table);
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].target, 3);
        assert_eq!(cands[1].target, 1);
        assert_eq!(cands[0].expected_gain, 0.0);
        assert!((cands[1].expected_gain - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_partial_fix_beats_idle_on_calm_route() {
        // Route 0 passes a busy station; acting there still leaves a deficit.
        // Route 1 only passes calm stations, so idling there scores 0.
        let routes = vec![
            RouteCandidates {
                route: Route::from_stations(vec![0, 1]).expect("valid"),
                patterns: vec![Pattern::idle(), Pattern::new(LoadingMode::BatterySwap)],
            },
            RouteCandidates {
                route: Route::from_stations(vec![0, 2]).expect("valid"),
                patterns: vec![Pattern::idle(), Pattern::new(LoadingMode::BatterySwap)],
            },
        ];
        let table = ScoreTable::new(vec![
            vec![vec![-4.0, -3.0], vec![-2.0, -1.0]],
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
        ]);
        let cands = MasterCandidate::enumerate(0, &routes, &table);
        let best = cands
            .iter()
            .max_by(|a, b| a.expected_gain.total_cmp(&b.expected_gain))
            .expect("candidates");
        assert_eq!(best.target, 1);
        assert!(!best.loading.is_idle());
        assert!((best.expected_gain - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_one_selection_per_vehicle() {
        let stations = vec![Station::new(0, 10), Station::new(1, 10), Station::new(2, 10)];
        let vehicles = vec![Vehicle::new(0, 0), Vehicle::new(1, 2)];
        let candidates = vec![
            vec![
                cand(0, LoadingMode::Idle, 0, 0.0),
                cand(1, LoadingMode::Full, 1, 2.0),
                cand(2, LoadingMode::BatterySwap, 2, 1.0),
            ],
            vec![
                cand(0, LoadingMode::Idle, 2, 3.0),
                cand(1, LoadingMode::Full, 1, 1.0),
            ],
        ];
        let (reward, config) = (RewardConfig::default(), MasterConfig::default());
        let optimizer = MicroLpOptimizer::new();
        let solved = MasterSelector::new(&stations, &reward, &config, &optimizer)
            .select(&vehicles, &candidates, &no_scenarios())
            .expect("feasible");

        for (v, cands) in candidates.iter().enumerate() {
            let total: f64 = cands
                .iter()
                .enumerate()
                .map(|(c, cand)| value(&solved, cand.key(v, c)))
                .sum();
            assert!((total - 1.0).abs() < 1e-6);
        }
        assert!((value(&solved, candidates[0][1].key(0, 1)) - 1.0).abs() < 1e-6);
        assert!((value(&solved, candidates[1][0].key(1, 0)) - 1.0).abs() < 1e-6);
        assert!(solved.optimal);
        assert!((solved.objective - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_vehicle_without_candidates_has_no_variables() {
        let stations = vec![Station::new(0, 10)];
        let vehicles = vec![Vehicle::new(0, 0)];
        let (reward, config) = (RewardConfig::default(), MasterConfig::default());
        let optimizer = MicroLpOptimizer::new();
        let f = MasterSelector::new(&stations, &reward, &config, &optimizer).formulate(
            &vehicles,
            &[vec![]],
            &no_scenarios(),
        );
        assert!(f.variables().is_empty());
    }

    #[test]
    fn test_exclusive_targets() {
        let stations = vec![Station::new(0, 10), Station::new(1, 10), Station::new(2, 10)];
        let vehicles = vec![Vehicle::new(0, 0), Vehicle::new(1, 2)];
        let candidates = vec![
            vec![
                cand(0, LoadingMode::Idle, 0, 0.0),
                cand(1, LoadingMode::Full, 1, 5.0),
            ],
            vec![
                cand(0, LoadingMode::Idle, 2, 0.0),
                cand(1, LoadingMode::Full, 1, 4.0),
            ],
        ];
        let reward = RewardConfig::default();
        let optimizer = MicroLpOptimizer::new();

        let shared = MasterConfig::default();
        let solved = MasterSelector::new(&stations, &reward, &shared, &optimizer)
            .select(&vehicles, &candidates, &no_scenarios())
            .expect("feasible");
        assert!((value(&solved, candidates[0][1].key(0, 1)) - 1.0).abs() < 1e-6);
        assert!((value(&solved, candidates[1][1].key(1, 1)) - 1.0).abs() < 1e-6);

        let exclusive = MasterConfig {
            exclusive_targets: true,
            ..MasterConfig::default()
        };
        let solved = MasterSelector::new(&stations, &reward, &exclusive, &optimizer)
            .select(&vehicles, &candidates, &no_scenarios())
            .expect("feasible");
        assert!((value(&solved, candidates[0][1].key(0, 1)) - 1.0).abs() < 1e-6);
        assert!((value(&solved, candidates[1][0].key(1, 0)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_quantities_follow_selected_target() {
        let stations = vec![Station::new(0, 10), Station::new(1, 10).with_loads(0, 4)];
        let vehicles = vec![Vehicle::new(0, 0).with_capacities(10, 0).with_loads(10, 0, 0)];
        let busy = StationEvents::new().with_events(DemandType::OutgoingCharged, vec![0, 0, 1]);
        let scenarios = ScenarioSet::new(2, vec![Scenario::new(vec![StationEvents::new(), busy])]);
        let candidates = vec![vec![
            cand(0, LoadingMode::Idle, 0, -3.0),
            cand(1, LoadingMode::BatterySwap, 1, 0.0),
        ]];
        let (reward, config) = (RewardConfig::default(), MasterConfig::default());
        let optimizer = MicroLpOptimizer::new();
        let solved = MasterSelector::new(&stations, &reward, &config, &optimizer)
            .select(&vehicles, &candidates, &scenarios)
            .expect("feasible");

        let swaps = value(
            &solved,
            VarKey::vehicle(VarKind::Quantity(QuantityKind::BatterySwap), 0),
        );
        assert!(swaps > 2.5 && swaps < 4.5, "swaps {swaps}");
        let pickups = value(
            &solved,
            VarKey::vehicle(VarKind::Quantity(QuantityKind::FlatPickup), 0),
        );
        assert!(pickups.abs() < 1e-6);
    }

    #[test]
    fn test_idle_forces_zero_quantities() {
        let stations = vec![Station::new(0, 10).with_loads(3, 3)];
        let vehicles = vec![Vehicle::new(0, 0).with_capacities(5, 5).with_loads(5, 1, 1)];
        let candidates = vec![vec![cand(0, LoadingMode::Idle, 0, 0.0)]];
        let (reward, config) = (RewardConfig::default(), MasterConfig::default());
        let optimizer = MicroLpOptimizer::new();
        let solved = MasterSelector::new(&stations, &reward, &config, &optimizer)
            .select(&vehicles, &candidates, &no_scenarios())
            .expect("feasible");
        for kind in QuantityKind::ALL {
            let q = value(&solved, VarKey::vehicle(VarKind::Quantity(kind), 0));
            assert!(q.abs() < 1e-6, "{kind:?} = {q}");
        }
    }

    #[test]
    fn test_no_swaps_at_depot_target() {
        let stations = vec![
            Station::new(0, 10),
            Station::new(1, 10).with_loads(0, 4).with_depot(true),
        ];
        let vehicles = vec![Vehicle::new(0, 0).with_capacities(10, 0).with_loads(10, 0, 0)];
        let busy = StationEvents::new().with_events(DemandType::OutgoingCharged, vec![0, 0, 1]);
        let scenarios = ScenarioSet::new(2, vec![Scenario::new(vec![StationEvents::new(), busy])]);
        let candidates = vec![vec![
            cand(0, LoadingMode::Idle, 0, 0.0),
            cand(1, LoadingMode::BatterySwap, 1, 1.0),
        ]];
        let (reward, config) = (RewardConfig::default(), MasterConfig::default());
        let optimizer = MicroLpOptimizer::new();
        let solved = MasterSelector::new(&stations, &reward, &config, &optimizer)
            .select(&vehicles, &candidates, &scenarios)
            .expect("feasible");
        let swaps = value(
            &solved,
            VarKey::vehicle(VarKind::Quantity(QuantityKind::BatterySwap), 0),
        );
        assert!(swaps.abs() < 1e-6);
    }

    #[test]
    fn test_idle_incumbent_is_feasible() {
        let stations = vec![
            Station::new(0, 3).with_loads(1, 2),
            Station::new(1, 10).with_loads(0, 4).with_charging(true),
        ];
        let vehicles = vec![
            Vehicle::new(0, 0).with_capacities(10, 4).with_loads(6, 1, 2),
            Vehicle::new(1, 1),
            Vehicle::new(2, 1),
        ];
        let crowded = StationEvents::new()
            .with_events(DemandType::IncomingCharged, vec![0, 1])
            .with_events(DemandType::IncomingFlat, vec![1]);
        let busy = StationEvents::new().with_events(DemandType::OutgoingCharged, vec![0, 0, 1]);
        let scenarios = ScenarioSet::new(2, vec![Scenario::new(vec![crowded, busy])]);
        let candidates = vec![
            vec![
                cand(0, LoadingMode::Full, 1, 2.0),
                cand(1, LoadingMode::Idle, 0, 0.0),
            ],
            vec![],
            vec![
                cand(0, LoadingMode::Idle, 1, 0.0),
                cand(1, LoadingMode::Full, 0, 1.0),
            ],
        ];
        let reward = RewardConfig::default();
        let config = MasterConfig {
            exclusive_targets: true,
            ..MasterConfig::default()
        };
        let optimizer = MicroLpOptimizer::new();
        let f = MasterSelector::new(&stations, &reward, &config, &optimizer).formulate(
            &vehicles,
            &candidates,
            &scenarios,
        );
        let values = f.incumbent().expect("every vehicle can idle");
        assert!(f.is_feasible(values, 1e-9));
        let idle = candidates[0][1].key(0, 1);
        assert_eq!(values[f.var(&idle).expect("registered").index()], 1.0);
    }

    #[test]
    fn test_no_incumbent_without_idle_candidate() {
        let stations = vec![Station::new(0, 10), Station::new(1, 10)];
        let vehicles = vec![Vehicle::new(0, 0)];
        let candidates = vec![vec![cand(0, LoadingMode::Full, 1, 1.0)]];
        let (reward, config) = (RewardConfig::default(), MasterConfig::default());
        let optimizer = MicroLpOptimizer::new();
        let f = MasterSelector::new(&stations, &reward, &config, &optimizer).formulate(
            &vehicles,
            &candidates,
            &no_scenarios(),
        );
        assert!(f.incumbent().is_none());
    }

    #[test]
    fn test_infeasible_is_fatal() {
        let stations = vec![Station::new(0, 10)];
        let vehicles = vec![Vehicle::new(0, 0)];
        let candidates = vec![vec![cand(0, LoadingMode::Idle, 0, 0.0)]];
        let (reward, config) = (RewardConfig::default(), MasterConfig::default());
        for status in [
            SolveStatus::Infeasible,
            SolveStatus::Error("backend down".into()),
            SolveStatus::TimeLimitReached,
        ] {
            let backend = FixedStatus(status);
            let err = MasterSelector::new(&stations, &reward, &config, &backend)
                .select(&vehicles, &candidates, &no_scenarios())
                .unwrap_err();
            assert!(matches!(err, PlanningError::InfeasibleMasterProblem { .. }));
        }
    }

    #[test]
    fn test_time_limit_with_incumbent_accepted() {
        let stations = vec![Station::new(0, 10)];
        let vehicles = vec![Vehicle::new(0, 0)];
        let candidates = vec![vec![cand(0, LoadingMode::Idle, 0, 0.0)]];
        let (reward, config) = (RewardConfig::default(), MasterConfig::default());
        let solved = MasterSelector::new(&stations, &reward, &config, &SlowBackend)
            .select(&vehicles, &candidates, &no_scenarios())
            .expect("incumbent");
        assert!(!solved.optimal);
        assert_eq!(
            solved.warning,
            Some(PlanningError::OptimizerTimeLimit {
                stage: Stage::Master
            })
        );
    }
}
