//! Allocation subproblem for one (vehicle, route, pattern, scenario).
//!
//! The vehicle drives the route and, at each visited stop, decides how many
//! batteries to swap and how many charged or flat bikes to load or unload.
//! Stockout and overflow the scenario's demand would cause are absorbed by
//! penalized slack variables, so the program is feasible whenever the inputs
//! are valid: doing nothing always fits, and that allocation is attached to
//! every formulation as the incumbent a time-limited backend falls back to.
//!
//! A depot stop takes no battery swaps and refills the battery compartment.

use std::time::Duration;

use crate::config::RewardConfig;
use crate::error::{PlanningError, ScoringContext, Stage};
use crate::models::{
    Cargo, DemandCounts, Pattern, QuantityKind, Route, Scenario, Station, Vehicle,
};
use crate::optimizer::{
    Assignment, Domain, Formulation, LinearExpr, Optimizer, OptimizerResult, Sense, SolveStatus,
    VarId, VarKey, VarKind, ViolationKind,
};

/// Score recorded for a subproblem without a usable solve.
///
/// Finite so that expected scores stay comparable.
pub const INFEASIBLE_SCORE: f64 = -1e9;

/// Violation slack totals over the visited stops.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViolationSummary {
    pub station_floor: f64,
    pub station_ceiling: f64,
    pub charging_floor: f64,
    pub charging_ceiling: f64,
}

impl ViolationSummary {
    /// Sums violation slacks found in an assignment.
    pub fn from_assignment(assignment: &Assignment) -> Self {
        let mut summary = Self::default();
        for (key, &value) in assignment.iter() {
            if let VarKind::Violation(kind) = key.kind {
                *summary.slot(kind) += value;
            }
        }
        summary
    }

    /// Total of a single violation kind.
    pub fn get(&self, kind: ViolationKind) -> f64 {
        match kind {
            ViolationKind::StationFloor => self.station_floor,
            ViolationKind::StationCeiling => self.station_ceiling,
            ViolationKind::ChargingFloor => self.charging_floor,
            ViolationKind::ChargingCeiling => self.charging_ceiling,
        }
    }

    /// Sum of all violations.
    pub fn total(&self) -> f64 {
        self.station_floor + self.station_ceiling + self.charging_floor + self.charging_ceiling
    }

    fn slot(&mut self, kind: ViolationKind) -> &mut f64 {
        match kind {
            ViolationKind::StationFloor => &mut self.station_floor,
            ViolationKind::StationCeiling => &mut self.station_ceiling,
            ViolationKind::ChargingFloor => &mut self.charging_floor,
            ViolationKind::ChargingCeiling => &mut self.charging_ceiling,
        }
    }
}

/// Result of scoring one subproblem.
#[derive(Debug, Clone, PartialEq)]
pub struct SubproblemOutcome {
    /// Objective value, or [`INFEASIBLE_SCORE`].
    pub score: f64,
    /// Violations in the returned allocation (zero when none was returned).
    pub violations: ViolationSummary,
    /// Optimizer status.
    pub status: SolveStatus,
    /// Non-fatal diagnostic raised by this solve.
    pub warning: Option<PlanningError>,
}

impl SubproblemOutcome {
    /// The scalar score.
    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Variables registered for one visited stop.
#[derive(Debug, Clone, Copy)]
struct StopVars {
    station: usize,
    depot: bool,
    quantities: [VarId; 5],
    loads: [VarId; 3],
    violations: [VarId; 4],
}

impl StopVars {
    fn register(
        f: &mut Formulation,
        vehicle: usize,
        station: usize,
        depot: bool,
        pattern: &Pattern,
    ) -> Self {
        let quantities = QuantityKind::ALL.map(|kind| {
            let swap_at_depot = depot && kind == QuantityKind::BatterySwap;
            let upper = if pattern.allows(kind) && !swap_at_depot {
                None
            } else {
                Some(0.0)
            };
            f.add_variable(
                VarKey::at(VarKind::Quantity(kind), vehicle, station),
                Domain::Continuous,
                0.0,
                upper,
            )
        });
        let loads = Cargo::ALL.map(|cargo| {
            f.add_variable(
                VarKey::at(VarKind::Load(cargo), vehicle, station),
                Domain::Continuous,
                0.0,
                None,
            )
        });
        let violations = ViolationKind::ALL.map(|kind| {
            f.add_variable(
                VarKey::at(VarKind::Violation(kind), vehicle, station),
                Domain::Continuous,
                0.0,
                None,
            )
        });
        Self {
            station,
            depot,
            quantities,
            loads,
            violations,
        }
    }

    fn q(&self, kind: QuantityKind) -> VarId {
        self.quantities[kind as usize]
    }

    fn load(&self, cargo: Cargo) -> VarId {
        self.loads[cargo as usize]
    }

    fn violation(&self, kind: ViolationKind) -> VarId {
        self.violations[kind as usize]
    }

    /// Net charged bikes added to the station: `q_B + q_CCU - q_CCL`.
    fn charged_gain(&self) -> LinearExpr {
        LinearExpr::new()
            .term(self.q(QuantityKind::BatterySwap), 1.0)
            .term(self.q(QuantityKind::ChargedDelivery), 1.0)
            .term(self.q(QuantityKind::ChargedPickup), -1.0)
    }
}

/// Formulates and scores allocation subproblems.
///
/// # Examples
///
/// ```
/// use u_rebalance::config::RewardConfig;
/// use u_rebalance::error::ScoringContext;
/// use u_rebalance::evaluation::SubproblemEvaluator;
/// use u_rebalance::models::{LoadingMode, Pattern, Route, Scenario, Station, Vehicle};
/// use u_rebalance::optimizer::MicroLpOptimizer;
///
/// let stations = vec![Station::new(0, 10), Station::new(1, 10).with_loads(2, 3)];
/// let reward = RewardConfig { base_reward: 4.0, ..RewardConfig::default() };
/// let optimizer = MicroLpOptimizer::new();
/// let evaluator = SubproblemEvaluator::new(&stations, &reward, &optimizer);
///
/// let route = Route::from_stations(vec![0, 1]).unwrap();
/// let ctx = ScoringContext { vehicle: 0, route: 0, pattern: 0, scenario: 0 };
/// let outcome = evaluator.evaluate(
///     ctx,
///     &Vehicle::new(0, 0),
///     &route,
///     &Pattern::new(LoadingMode::Full),
///     &Scenario::empty(2),
/// );
/// assert!((outcome.score() - 4.0).abs() < 1e-6);
/// assert!(outcome.warning.is_none());
/// ```
pub struct SubproblemEvaluator<'a, O: ?Sized> {
    stations: &'a [Station],
    reward: &'a RewardConfig,
    optimizer: &'a O,
    time_limit: Option<Duration>,
}

impl<'a, O: Optimizer + ?Sized> SubproblemEvaluator<'a, O> {
    /// Creates an evaluator over the canonical station list.
    pub fn new(stations: &'a [Station], reward: &'a RewardConfig, optimizer: &'a O) -> Self {
        Self {
            stations,
            reward,
            optimizer,
            time_limit: None,
        }
    }

    /// Sets the per-solve time budget.
    pub fn with_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    /// Builds the allocation program.
    ///
    /// Variables are keyed by `vehicle_index` and the canonical index of each
    /// visited stop.
    pub fn formulate(
        &self,
        vehicle_index: usize,
        vehicle: &Vehicle,
        route: &Route,
        pattern: &Pattern,
        scenario: &Scenario,
    ) -> Formulation {
        let reward = self.reward;
        let mut f = Formulation::new(format!("subproblem[v{vehicle_index}]"), Sense::Maximize)
            .with_time_limit(self.time_limit);

        let stops: Vec<StopVars> = route
            .visited()
            .iter()
            .map(|&s| {
                let depot = self.stations[s].is_depot();
                StopVars::register(&mut f, vehicle_index, s, depot, pattern)
            })
            .collect();
        let bonus = f.add_variable(
            VarKey::vehicle(VarKind::FlatBonus, vehicle_index),
            Domain::Continuous,
            0.0,
            None,
        );

        if let Some(first) = stops.first() {
            for cargo in Cargo::ALL {
                f.add_eq(
                    LinearExpr::new().term(first.load(cargo), 1.0),
                    f64::from(vehicle.load(cargo)),
                );
            }
        }
        for pair in stops.windows(2) {
            add_continuity(&mut f, vehicle, &pair[0], &pair[1]);
        }

        let visited_value: f64 = stops.iter().map(|s| self.stations[s.station].value()).sum();
        let constant = reward.w_v * (reward.base_reward + visited_value)
            + reward.w_r * reward.base_bonus_reward;
        let mut objective = LinearExpr::constant(constant).term(bonus, reward.w_r);
        let mut bonus_cap = LinearExpr::new().term(bonus, 1.0);

        for stop in &stops {
            let station = &self.stations[stop.station];
            add_vehicle_limits(&mut f, vehicle, stop);
            add_station_limits(&mut f, station, stop);
            add_violation_rows(&mut f, station, scenario.counts(stop.station), stop);

            if station.is_charging() {
                bonus_cap.add_term(stop.q(QuantityKind::FlatDelivery), -1.0);
            }
            for kind in ViolationKind::ALL {
                objective.add_term(stop.violation(kind), -0.5 * reward.w_v);
            }
        }

        f.add_le(bonus_cap, 0.0);
        f.set_objective(objective);
        let incumbent = self.do_nothing(&f, vehicle, &stops, scenario);
        f.set_incumbent(incumbent);
        f
    }

    /// Values of the allocation that moves nothing: cargo rides along and
    /// the slacks absorb the scenario's demand.
    fn do_nothing(
        &self,
        f: &Formulation,
        vehicle: &Vehicle,
        stops: &[StopVars],
        scenario: &Scenario,
    ) -> Vec<f64> {
        let mut values = vec![0.0; f.variables().len()];
        let mut loads = Cargo::ALL.map(|cargo| f64::from(vehicle.load(cargo)));
        for stop in stops {
            for cargo in Cargo::ALL {
                values[stop.load(cargo).index()] = loads[cargo as usize];
            }
            let slack = idle_slack(&self.stations[stop.station], scenario.counts(stop.station));
            for kind in ViolationKind::ALL {
                values[stop.violation(kind).index()] = slack[kind as usize];
            }
            if stop.depot {
                loads[Cargo::Battery as usize] = f64::from(vehicle.battery_capacity());
            }
        }
        values
    }

    /// Formulates, solves and scores one combination.
    ///
    /// Never fails: an unusable solve yields [`INFEASIBLE_SCORE`] and a
    /// [`PlanningError::SubproblemInfeasible`] warning; a time-limited solve
    /// keeps its best-found score and warns with
    /// [`PlanningError::OptimizerTimeLimit`].
    pub fn evaluate(
        &self,
        context: ScoringContext,
        vehicle: &Vehicle,
        route: &Route,
        pattern: &Pattern,
        scenario: &Scenario,
    ) -> SubproblemOutcome {
        let formulation = self.formulate(context.vehicle, vehicle, route, pattern, scenario);
        let OptimizerResult {
            status,
            objective,
            assignment,
        } = self.optimizer.solve(&formulation);

        match (status, objective, assignment) {
            (SolveStatus::Optimal, Some(score), Some(assignment)) => SubproblemOutcome {
                score,
                violations: ViolationSummary::from_assignment(&assignment),
                status: SolveStatus::Optimal,
                warning: None,
            },
            (SolveStatus::TimeLimitReached, Some(score), Some(assignment)) => SubproblemOutcome {
                score,
                violations: ViolationSummary::from_assignment(&assignment),
                status: SolveStatus::TimeLimitReached,
                warning: Some(PlanningError::OptimizerTimeLimit {
                    stage: Stage::Subproblem(context),
                }),
            },
            (status, _, _) => {
                let reason = match &status {
                    SolveStatus::Infeasible => "no feasible allocation".to_string(),
                    SolveStatus::Error(msg) => msg.clone(),
                    SolveStatus::TimeLimitReached => {
                        "time limit reached without a feasible allocation".to_string()
                    }
                    SolveStatus::Optimal => "optimizer returned no values".to_string(),
                };
                SubproblemOutcome {
                    score: INFEASIBLE_SCORE,
                    violations: ViolationSummary::default(),
                    status,
                    warning: Some(PlanningError::SubproblemInfeasible { context, reason }),
                }
            }
        }
    }
}

fn add_continuity(f: &mut Formulation, vehicle: &Vehicle, k: &StopVars, next: &StopVars) {
    if k.depot {
        // l_B' = Q_BV
        f.add_eq(
            LinearExpr::new().term(next.load(Cargo::Battery), 1.0),
            f64::from(vehicle.battery_capacity()),
        );
    } else {
        // l_B' = l_B - q_B
        f.add_eq(
            LinearExpr::new()
                .term(next.load(Cargo::Battery), 1.0)
                .term(k.load(Cargo::Battery), -1.0)
                .term(k.q(QuantityKind::BatterySwap), 1.0),
            0.0,
        );
    }
    // l_C' = l_C + q_CCL - q_CCU
    f.add_eq(
        LinearExpr::new()
            .term(next.load(Cargo::ChargedBike), 1.0)
            .term(k.load(Cargo::ChargedBike), -1.0)
            .term(k.q(QuantityKind::ChargedPickup), -1.0)
            .term(k.q(QuantityKind::ChargedDelivery), 1.0),
        0.0,
    );
    // l_F' = l_F + q_FCL - q_FCU
    f.add_eq(
        LinearExpr::new()
            .term(next.load(Cargo::FlatBike), 1.0)
            .term(k.load(Cargo::FlatBike), -1.0)
            .term(k.q(QuantityKind::FlatPickup), -1.0)
            .term(k.q(QuantityKind::FlatDelivery), 1.0),
        0.0,
    );
}

fn add_vehicle_limits(f: &mut Formulation, vehicle: &Vehicle, stop: &StopVars) {
    for (kind, cargo) in [
        (QuantityKind::BatterySwap, Cargo::Battery),
        (QuantityKind::ChargedDelivery, Cargo::ChargedBike),
        (QuantityKind::FlatDelivery, Cargo::FlatBike),
    ] {
        f.add_le(
            LinearExpr::new().term(stop.q(kind), 1.0).term(stop.load(cargo), -1.0),
            0.0,
        );
    }
    f.add_le(
        LinearExpr::new()
            .term(stop.load(Cargo::ChargedBike), 1.0)
            .term(stop.load(Cargo::FlatBike), 1.0)
            .term(stop.q(QuantityKind::ChargedPickup), 1.0)
            .term(stop.q(QuantityKind::FlatPickup), 1.0)
            .term(stop.q(QuantityKind::ChargedDelivery), -1.0)
            .term(stop.q(QuantityKind::FlatDelivery), -1.0),
        f64::from(vehicle.bike_capacity()),
    );
}

fn add_station_limits(f: &mut Formulation, station: &Station, stop: &StopVars) {
    let charged = f64::from(station.charged_load());
    let flat = f64::from(station.flat_load());
    let q = |kind| stop.q(kind);

    f.add_le(LinearExpr::new().term(q(QuantityKind::ChargedPickup), 1.0), charged);
    f.add_le(LinearExpr::new().term(q(QuantityKind::FlatPickup), 1.0), flat);
    // Swaps draw on the flat bikes left at the station.
    f.add_le(
        LinearExpr::new()
            .term(q(QuantityKind::BatterySwap), 1.0)
            .term(q(QuantityKind::FlatPickup), 1.0)
            .term(q(QuantityKind::FlatDelivery), -1.0),
        flat,
    );
    f.add_le(
        LinearExpr::new()
            .term(q(QuantityKind::ChargedDelivery), 1.0)
            .term(q(QuantityKind::FlatDelivery), 1.0)
            .term(q(QuantityKind::ChargedPickup), -1.0)
            .term(q(QuantityKind::FlatPickup), -1.0),
        f64::from(station.capacity()) - charged - flat,
    );
    f.add_le(stop.charged_gain(), f64::from(station.charged_capacity()) - charged);
    f.add_le(
        LinearExpr::new()
            .term(q(QuantityKind::FlatDelivery), 1.0)
            .term(q(QuantityKind::FlatPickup), -1.0)
            .term(q(QuantityKind::BatterySwap), -1.0),
        f64::from(station.flat_capacity()) - flat,
    );
}

/// Slack each violation row needs when nothing moves, in
/// [`ViolationKind::ALL`] order.
fn idle_slack(station: &Station, demand: DemandCounts) -> [f64; 4] {
    let charged = f64::from(station.charged_load());
    let flat = f64::from(station.flat_load());
    let DemandCounts {
        incoming_charged: ic,
        incoming_flat: inf,
        outgoing_charged: oc,
    } = demand;
    [
        (oc - charged - ic).max(0.0),
        (charged + flat + ic + inf - oc - f64::from(station.capacity())).max(0.0),
        (oc - charged).max(0.0),
        (charged + ic - f64::from(station.charged_capacity())).max(0.0),
    ]
}

fn add_violation_rows(f: &mut Formulation, station: &Station, demand: DemandCounts, stop: &StopVars) {
    let charged = f64::from(station.charged_load());
    let flat = f64::from(station.flat_load());
    let DemandCounts {
        incoming_charged: ic,
        incoming_flat: inf,
        outgoing_charged: oc,
    } = demand;

    let mut floor = stop.charged_gain();
    floor.add_term(stop.violation(ViolationKind::StationFloor), 1.0);
    f.add_ge(floor, -(charged + ic - oc));

    let ceiling = LinearExpr::new()
        .term(stop.q(QuantityKind::ChargedDelivery), 1.0)
        .term(stop.q(QuantityKind::FlatDelivery), 1.0)
        .term(stop.q(QuantityKind::ChargedPickup), -1.0)
        .term(stop.q(QuantityKind::FlatPickup), -1.0)
        .term(stop.violation(ViolationKind::StationCeiling), -1.0);
    f.add_le(
        ceiling,
        f64::from(station.capacity()) - (charged + flat + ic + inf - oc),
    );

    let mut charging_floor = stop.charged_gain();
    charging_floor.add_term(stop.violation(ViolationKind::ChargingFloor), 1.0);
    f.add_ge(charging_floor, -(charged - oc));

    let mut charging_ceiling = stop.charged_gain();
    charging_ceiling.add_term(stop.violation(ViolationKind::ChargingCeiling), -1.0);
    f.add_le(
        charging_ceiling,
        f64::from(station.charged_capacity()) - (charged + ic),
    );
}
