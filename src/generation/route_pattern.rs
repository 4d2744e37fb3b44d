//! Route and loading pattern enumeration.
//!
//! Routes grow breadth-first from the vehicle's current station. Each partial
//! route is extended by its `branching` nearest unvisited stations; every
//! extension is a candidate, and extensions shorter than `max_stops` are
//! queued for further growth. The search stops once `max_routes` candidates
//! exist or the frontier runs dry.
//!
//! # Complexity
//!
//! O(max_routes · n log n) where n = number of stations.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::config::RouteConfig;
use crate::distance::TravelTimeMatrix;
use crate::error::PlanningError;
use crate::models::{LoadingMode, Pattern, Route, Station, StationIndex, Vehicle};

/// A route together with the loading patterns to score on it.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteCandidates {
    pub route: Route,
    pub patterns: Vec<Pattern>,
}

/// Enumerates candidate (route, pattern) pairs for a vehicle.
///
/// # Examples
///
/// ```
/// use u_rebalance::config::RouteConfig;
/// use u_rebalance::distance::TravelTimeMatrix;
/// use u_rebalance::generation::RoutePatternGenerator;
/// use u_rebalance::models::{Station, StationIndex, Vehicle};
///
/// let stations = vec![
///     Station::new(0, 10),
///     Station::new(1, 10).with_location(1.0, 0.0),
///     Station::new(2, 10).with_location(2.0, 0.0),
/// ];
/// let index = StationIndex::new(&stations).unwrap();
/// let travel = TravelTimeMatrix::from_stations(&stations, 1.0);
/// let vehicle = Vehicle::new(0, 0);
///
/// let generator = RoutePatternGenerator::new(RouteConfig::default());
/// let candidates = generator.generate(&vehicle, &stations, &index, &travel).unwrap();
///
/// assert!(candidates.iter().all(|c| c.route.start() == 0));
/// assert_eq!(candidates[0].route.target(), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct RoutePatternGenerator {
    config: RouteConfig,
}

impl RoutePatternGenerator {
    /// Creates a generator with the given search bounds.
    pub fn new(config: RouteConfig) -> Self {
        Self { config }
    }

    /// Search bounds.
    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Generates the candidates for one vehicle.
    ///
    /// An empty result means the vehicle has no reachable station.
    ///
    /// # Errors
    ///
    /// [`PlanningError::Configuration`] if the vehicle's station is unknown.
    pub fn generate(
        &self,
        vehicle: &Vehicle,
        stations: &[Station],
        index: &StationIndex,
        travel: &TravelTimeMatrix,
    ) -> Result<Vec<RouteCandidates>, PlanningError> {
        let start = index.position(vehicle.station_id()).map_err(|_| {
            PlanningError::Configuration(format!(
                "vehicle {} is at unknown station {}",
                vehicle.id(),
                vehicle.station_id()
            ))
        })?;

        let routes = self.routes_from(start, travel);
        let candidates: Vec<RouteCandidates> = routes
            .into_iter()
            .map(|route| {
                let patterns = patterns_for(&route, stations);
                RouteCandidates { route, patterns }
            })
            .collect();

        debug!(
            vehicle = vehicle.id(),
            routes = candidates.len(),
            patterns = candidates.iter().map(|c| c.patterns.len()).sum::<usize>(),
            "generated route candidates"
        );
        Ok(candidates)
    }

    fn routes_from(&self, start: usize, travel: &TravelTimeMatrix) -> Vec<Route> {
        let n = travel.size();
        let mut frontier = VecDeque::from([Route::new(start)]);
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut routes = Vec::new();

        'search: while let Some(partial) = frontier.pop_front() {
            let from = partial.last();
            let unvisited: Vec<usize> = (0..n).filter(|&s| !partial.contains(s)).collect();

            for next in travel.nearest(from, &unvisited, self.config.branching) {
                let route = partial.extended(next, travel.get(from, next));
                if self
                    .config
                    .max_duration
                    .is_some_and(|limit| route.travel_time() > limit)
                {
                    continue;
                }
                if !seen.insert(route.stations().to_vec()) {
                    continue;
                }
                if route.len() < self.config.max_stops {
                    frontier.push_back(route.clone());
                }
                routes.push(route);
                if routes.len() >= self.config.max_routes {
                    break 'search;
                }
            }
        }

        routes
    }
}

/// Loading patterns worth scoring on a route.
///
/// `FlatTransfer` needs somewhere to charge flat bikes, so it is only offered
/// when a visited stop is charging-capable.
pub fn patterns_for(route: &Route, stations: &[Station]) -> Vec<Pattern> {
    let charges = route
        .visited()
        .iter()
        .any(|&s| stations.get(s).is_some_and(Station::is_charging));

    let mut patterns = vec![
        Pattern::idle(),
        Pattern::new(LoadingMode::BatterySwap),
        Pattern::new(LoadingMode::ChargedTransfer),
    ];
    if charges {
        patterns.push(Pattern::new(LoadingMode::FlatTransfer));
    }
    patterns.push(Pattern::new(LoadingMode::Full));
    patterns
}
