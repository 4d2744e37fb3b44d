//! End-to-end planning run.
//!
//! Stages run in order with a barrier between each: scenarios, candidate
//! generation, parallel scoring, master selection, extraction. Only scenario
//! generation consumes the random stream, so a seed fixes the whole run.

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::PlanningConfig;
use crate::distance::TravelTimeMatrix;
use crate::error::{PlanningError, ScoringContext};
use crate::evaluation::{ScoreTable, SubproblemEvaluator, SubproblemOutcome, INFEASIBLE_SCORE};
use crate::generation::{RouteCandidates, RoutePatternGenerator};
use crate::master::{MasterCandidate, MasterSelector, SolutionExtractor};
use crate::models::{MasterSolution, Station, StationIndex, Vehicle, VehiclePlan};
use crate::optimizer::Optimizer;
use crate::scenario::ScenarioGenerator;

/// Result of a planning run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningOutcome {
    /// One plan per vehicle, in fleet order.
    pub solution: MasterSolution,
    /// Non-fatal diagnostics raised along the way.
    pub warnings: Vec<PlanningError>,
}

impl PlanningOutcome {
    /// Plan for the vehicle with the given ID.
    pub fn plan_for(&self, vehicle_id: usize) -> Option<&VehiclePlan> {
        self.solution.plan_for(vehicle_id)
    }
}

/// Runs the rebalancing heuristic.
///
/// # Examples
///
/// ```
/// use u_rebalance::config::PlanningConfig;
/// use u_rebalance::heuristic::HeuristicManager;
/// use u_rebalance::models::{Station, Vehicle};
/// use u_rebalance::optimizer::MicroLpOptimizer;
///
/// let stations = vec![
///     Station::new(1, 20),
///     Station::new(2, 20).with_location(1.0, 0.0).with_loads(0, 6).with_rates(0.0, 0.0, 1.0),
/// ];
/// let vehicles = vec![Vehicle::new(0, 1).with_capacities(10, 0).with_loads(10, 0, 0)];
///
/// let config = PlanningConfig::default().with_scenario_count(10).with_horizon(2);
/// let manager = HeuristicManager::new(config, MicroLpOptimizer::new());
/// let outcome = manager.plan(&vehicles, &stations).unwrap();
///
/// let plan = outcome.plan_for(0).unwrap();
/// assert_eq!(plan.target_station, 2);
/// assert!(plan.quantities.battery_swaps > 0);
/// ```
#[derive(Debug, Clone)]
pub struct HeuristicManager<O> {
    config: PlanningConfig,
    optimizer: O,
}

impl<O: Optimizer> HeuristicManager<O> {
    /// Creates a manager.
    pub fn new(config: PlanningConfig, optimizer: O) -> Self {
        Self { config, optimizer }
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    /// Plans with a random stream seeded from the configuration.
    pub fn plan(
        &self,
        vehicles: &[Vehicle],
        stations: &[Station],
    ) -> Result<PlanningOutcome, PlanningError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.plan_with_rng(vehicles, stations, &mut rng)
    }

    /// Plans with an injected random stream.
    ///
    /// # Errors
    ///
    /// [`PlanningError::Configuration`] for invalid inputs,
    /// [`PlanningError::InfeasibleMasterProblem`] when no fleet-wide
    /// selection is found and [`PlanningError::MalformedSolutionData`] when
    /// the selection cannot be decoded.
    pub fn plan_with_rng<R: Rng + ?Sized>(
        &self,
        vehicles: &[Vehicle],
        stations: &[Station],
        rng: &mut R,
    ) -> Result<PlanningOutcome, PlanningError> {
        let config = &self.config;
        config.validate()?;
        let index = validate_inputs(vehicles, stations)?;
        info!(
            vehicles = vehicles.len(),
            stations = stations.len(),
            scenarios = config.scenario_count,
            "planning run started"
        );

        let travel = TravelTimeMatrix::from_stations(stations, config.travel_speed);
        let scenarios =
            ScenarioGenerator::new(config.scenario_count, config.horizon).generate(stations, rng)?;

        let generator = RoutePatternGenerator::new(config.routes.clone());
        let routes = vehicles
            .iter()
            .map(|v| generator.generate(v, stations, &index, &travel))
            .collect::<Result<Vec<_>, _>>()?;

        let tasks = scoring_tasks(&routes, scenarios.len());
        debug!(tasks = tasks.len(), "scoring subproblems");
        let evaluator = SubproblemEvaluator::new(stations, &config.reward, &self.optimizer)
            .with_time_limit(config.optimizer.subproblem_time_limit());
        let outcomes: Vec<SubproblemOutcome> = tasks
            .par_iter()
            .map(|ctx| {
                let candidate = &routes[ctx.vehicle][ctx.route];
                evaluator.evaluate(
                    *ctx,
                    &vehicles[ctx.vehicle],
                    &candidate.route,
                    &candidate.patterns[ctx.pattern],
                    &scenarios.scenarios()[ctx.scenario],
                )
            })
            .collect();

        let mut warnings = Vec::new();
        for outcome in &outcomes {
            if let Some(w) = &outcome.warning {
                warn!(warning = %w, "subproblem diagnostic");
                warnings.push(w.clone());
            }
        }

        // `outcomes` is in task order, which matches the table fill order.
        let mut scores = outcomes.iter().map(SubproblemOutcome::score);
        let tables: Vec<ScoreTable> = routes
            .iter()
            .map(|rcs| {
                let patterns: Vec<usize> = rcs.iter().map(|rc| rc.patterns.len()).collect();
                ScoreTable::from_fn(&patterns, scenarios.len(), |_, _, _| {
                    scores.next().unwrap_or(INFEASIBLE_SCORE)
                })
            })
            .collect();

        let mut candidates = Vec::with_capacity(vehicles.len());
        for ((vehicle, rcs), table) in vehicles.iter().zip(&routes).zip(&tables) {
            let start = index.position(vehicle.station_id())?;
            let cands = MasterCandidate::enumerate(start, rcs, table);
            if cands.is_empty() {
                debug!(vehicle = vehicle.id(), "no available plan");
            }
            candidates.push(cands);
        }

        let solution = if candidates.iter().all(Vec::is_empty) {
            let plans = vehicles
                .iter()
                .map(|v| VehiclePlan::unavailable(v.id(), v.station_id()))
                .collect();
            MasterSolution::new(plans, 0.0, true)
        } else {
            let selector = MasterSelector::new(
                stations,
                &config.reward,
                &config.master,
                &self.optimizer,
            )
            .with_time_limit(config.optimizer.master_time_limit());
            let solved = selector.select(vehicles, &candidates, &scenarios)?;
            if let Some(w) = &solved.warning {
                warnings.push(w.clone());
            }
            SolutionExtractor::new(stations).extract(vehicles, &candidates, &solved)?
        };

        info!(
            objective = solution.objective(),
            optimal = solution.is_optimal(),
            warnings = warnings.len(),
            "planning run finished"
        );
        Ok(PlanningOutcome { solution, warnings })
    }
}

fn validate_inputs(vehicles: &[Vehicle], stations: &[Station]) -> Result<StationIndex, PlanningError> {
    for station in stations {
        station.validate()?;
    }
    let index = StationIndex::new(stations)?;

    let mut ids = HashSet::with_capacity(vehicles.len());
    for vehicle in vehicles {
        vehicle.validate()?;
        if !ids.insert(vehicle.id()) {
            return Err(PlanningError::Configuration(format!(
                "duplicate vehicle id {}",
                vehicle.id()
            )));
        }
        index.position(vehicle.station_id()).map_err(|_| {
            PlanningError::Configuration(format!(
                "vehicle {} is at unknown station {}",
                vehicle.id(),
                vehicle.station_id()
            ))
        })?;
    }
    Ok(index)
}

/// Every (vehicle, route, pattern, scenario) in nested order.
fn scoring_tasks(routes: &[Vec<RouteCandidates>], scenario_count: usize) -> Vec<ScoringContext> {
    let mut tasks = Vec::new();
    for (vehicle, rcs) in routes.iter().enumerate() {
        for (route, rc) in rcs.iter().enumerate() {
            for pattern in 0..rc.patterns.len() {
                for scenario in 0..scenario_count {
                    tasks.push(ScoringContext {
                        vehicle,
                        route,
                        pattern,
                        scenario,
                    });
                }
            }
        }
    }
    tasks
}
