//! Poisson scenario generator.
//!
//! Every station gets three independent event timelines (incoming charged,
//! incoming flat, outgoing charged). At each time step `t` of the horizon the
//! number of events stamped `t` is drawn from `Poisson(rate * horizon)`.

use rand::Rng;
use rand_distr::{Distribution, Poisson};
use tracing::debug;

use crate::error::PlanningError;
use crate::models::{DemandType, Scenario, ScenarioSet, Station, StationEvents};

/// Draws demand scenarios from station rates.
///
/// The random stream is injected, so the same seed reproduces the same set.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use u_rebalance::models::{DemandType, Station};
/// use u_rebalance::scenario::ScenarioGenerator;
///
/// let stations = vec![Station::new(0, 10).with_rates(0.0, 0.0, 0.5)];
/// let generator = ScenarioGenerator::new(3, 4);
///
/// let a = generator.generate(&stations, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
/// let b = generator.generate(&stations, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 3);
/// assert_eq!(a.scenarios()[0].station(0).count(DemandType::IncomingCharged), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioGenerator {
    scenario_count: usize,
    horizon: u32,
}

impl ScenarioGenerator {
    /// Creates a generator for `scenario_count` scenarios over `horizon` steps.
    pub fn new(scenario_count: usize, horizon: u32) -> Self {
        Self {
            scenario_count,
            horizon,
        }
    }

    pub fn scenario_count(&self) -> usize {
        self.scenario_count
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Generates the scenario set.
    ///
    /// # Errors
    ///
    /// [`PlanningError::Configuration`] if any rate is negative or not
    /// finite. Rates are checked before the first draw.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        stations: &[Station],
        rng: &mut R,
    ) -> Result<ScenarioSet, PlanningError> {
        // One sampler per (station, demand type); `None` for zero rates.
        let mut samplers = Vec::with_capacity(stations.len());
        for station in stations {
            let mut per_type = [None, None, None];
            for (slot, demand) in per_type.iter_mut().zip(DemandType::ALL) {
                *slot = self.sampler(station, demand)?;
            }
            samplers.push(per_type);
        }

        let scenarios = (0..self.scenario_count)
            .map(|_| {
                let timelines = samplers
                    .iter()
                    .map(|per_type| self.draw_station(per_type, rng))
                    .collect();
                Scenario::new(timelines)
            })
            .collect();

        debug!(
            scenarios = self.scenario_count,
            stations = stations.len(),
            horizon = self.horizon,
            "generated demand scenarios"
        );
        Ok(ScenarioSet::new(self.horizon, scenarios))
    }

    fn sampler(
        &self,
        station: &Station,
        demand: DemandType,
    ) -> Result<Option<Poisson<f64>>, PlanningError> {
        let rate = station.rate(demand);
        if !rate.is_finite() || rate < 0.0 {
            return Err(PlanningError::Configuration(format!(
                "station {} has invalid {demand:?} rate {rate}",
                station.id()
            )));
        }
        let lambda = rate * f64::from(self.horizon);
        if lambda == 0.0 {
            return Ok(None);
        }
        Poisson::new(lambda).map(Some).map_err(|e| {
            PlanningError::Configuration(format!(
                "station {} {demand:?} rate {rate}: {e}",
                station.id()
            ))
        })
    }

    fn draw_station<R: Rng + ?Sized>(
        &self,
        per_type: &[Option<Poisson<f64>>; 3],
        rng: &mut R,
    ) -> StationEvents {
        let mut events = StationEvents::new();
        for (sampler, demand) in per_type.iter().zip(DemandType::ALL) {
            let Some(poisson) = sampler else { continue };
            for t in 0..self.horizon {
                let draw: f64 = poisson.sample(rng);
                events.push_events(demand, t, draw as usize);
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn stations() -> Vec<Station> {
        vec![
            Station::new(0, 10).with_rates(0.3, 0.1, 0.5),
            Station::new(1, 10).with_rates(0.0, 0.0, 0.0),
            Station::new(2, 10).with_rates(1.0, 0.0, 0.2),
        ]
    }

    #[test]
    fn test_same_seed_same_set() {
        let g = ScenarioGenerator::new(4, 6);
        let a = g
            .generate(&stations(), &mut ChaCha8Rng::seed_from_u64(42))
            .expect("valid");
        let b = g
            .generate(&stations(), &mut ChaCha8Rng::seed_from_u64(42))
            .expect("valid");
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert_eq!(a.horizon(), 6);
    }

    #[test]
    fn test_different_seeds_differ() {
        let g = ScenarioGenerator::new(4, 20);
        let a = g
            .generate(&stations(), &mut ChaCha8Rng::seed_from_u64(1))
            .expect("valid");
        let b = g
            .generate(&stations(), &mut ChaCha8Rng::seed_from_u64(2))
            .expect("valid");
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_rate_no_events() {
        let g = ScenarioGenerator::new(5, 10);
        let set = g
            .generate(&stations(), &mut ChaCha8Rng::seed_from_u64(3))
            .expect("valid");
        for scenario in set.scenarios() {
            for demand in DemandType::ALL {
                assert_eq!(scenario.station(1).count(demand), 0);
            }
            assert_eq!(scenario.station(2).count(DemandType::IncomingFlat), 0);
        }
    }

    #[test]
    fn test_every_station_covered() {
        let g = ScenarioGenerator::new(2, 3);
        let set = g
            .generate(&stations(), &mut ChaCha8Rng::seed_from_u64(0))
            .expect("valid");
        for scenario in set.scenarios() {
            assert_eq!(scenario.stations().len(), 3);
        }
    }

    #[test]
    fn test_negative_rate_rejected() {
        let bad = vec![Station::new(7, 10).with_rates(0.0, -0.1, 0.0)];
        let err = ScenarioGenerator::new(1, 5)
            .generate(&bad, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, PlanningError::Configuration(_)));
    }

    #[test]
    fn test_nan_rate_rejected() {
        let bad = vec![Station::new(7, 10).with_rates(f64::NAN, 0.0, 0.0)];
        let err = ScenarioGenerator::new(1, 5)
            .generate(&bad, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, PlanningError::Configuration(_)));
    }

    #[test]
    fn test_mean_tracks_rate() {
        // Expected events per step is rate * horizon, so per run rate * horizon².
        let g = ScenarioGenerator::new(200, 4);
        let stations = vec![Station::new(0, 10).with_rates(0.0, 0.0, 0.5)];
        let set = g
            .generate(&stations, &mut ChaCha8Rng::seed_from_u64(9))
            .expect("valid");
        let mean = set.expected_counts(0).outgoing_charged;
        assert!((mean - 8.0).abs() < 1.5, "mean {mean}");
    }

    proptest! {
        #[test]
        fn prop_timestamps_in_horizon_and_sorted(
            seed in any::<u64>(),
            horizon in 1u32..8,
            rate in 0.0f64..2.0,
        ) {
            let stations = vec![Station::new(0, 10).with_rates(rate, rate / 2.0, rate)];
            let set = ScenarioGenerator::new(3, horizon)
                .generate(&stations, &mut ChaCha8Rng::seed_from_u64(seed))
                .expect("valid");
            for scenario in set.scenarios() {
                for demand in DemandType::ALL {
                    let events = scenario.station(0).events(demand);
                    prop_assert!(events.iter().all(|&t| t < horizon));
                    prop_assert!(events.windows(2).all(|w| w[0] <= w[1]));
                }
            }
        }
    }
}
