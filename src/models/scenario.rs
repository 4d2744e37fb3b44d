//! Demand scenarios: per-station customer event timelines.

use super::DemandType;

/// Event timestamps at one station, one ordered sequence per demand type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationEvents {
    incoming_charged: Vec<u32>,
    incoming_flat: Vec<u32>,
    outgoing_charged: Vec<u32>,
}

impl StationEvents {
    /// Creates an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeline for a demand type; timestamps are sorted.
    pub fn with_events(mut self, demand: DemandType, mut times: Vec<u32>) -> Self {
        times.sort_unstable();
        *self.events_mut(demand) = times;
        self
    }

    /// Appends `count` events at time step `t`.
    ///
    /// Callers append in non-decreasing `t` so the sequence stays ordered.
    pub fn push_events(&mut self, demand: DemandType, t: u32, count: usize) {
        let events = self.events_mut(demand);
        debug_assert!(events.last().map_or(true, |&last| last <= t));
        events.extend(std::iter::repeat(t).take(count));
    }

    /// Timestamps for the given demand type.
    pub fn events(&self, demand: DemandType) -> &[u32] {
        match demand {
            DemandType::IncomingCharged => &self.incoming_charged,
            DemandType::IncomingFlat => &self.incoming_flat,
            DemandType::OutgoingCharged => &self.outgoing_charged,
        }
    }

    /// Number of events for the given demand type.
    pub fn count(&self, demand: DemandType) -> usize {
        self.events(demand).len()
    }

    fn events_mut(&mut self, demand: DemandType) -> &mut Vec<u32> {
        match demand {
            DemandType::IncomingCharged => &mut self.incoming_charged,
            DemandType::IncomingFlat => &mut self.incoming_flat,
            DemandType::OutgoingCharged => &mut self.outgoing_charged,
        }
    }
}

/// Event counts per demand type, possibly averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DemandCounts {
    /// Incoming charged bikes (`I_IC`).
    pub incoming_charged: f64,
    /// Incoming flat bikes (`I_IF`).
    pub incoming_flat: f64,
    /// Outgoing charged bikes (`I_OC`).
    pub outgoing_charged: f64,
}

/// One stochastic realization of demand for every station.
///
/// Stations are indexed by canonical position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    stations: Vec<StationEvents>,
}

impl Scenario {
    /// Creates a scenario from per-station timelines.
    pub fn new(stations: Vec<StationEvents>) -> Self {
        Self { stations }
    }

    /// Creates a scenario with no events at `n` stations.
    pub fn empty(n: usize) -> Self {
        Self {
            stations: vec![StationEvents::new(); n],
        }
    }

    /// Timelines for all stations.
    pub fn stations(&self) -> &[StationEvents] {
        &self.stations
    }

    /// Timeline at a station.
    pub fn station(&self, station: usize) -> &StationEvents {
        &self.stations[station]
    }

    /// Event counts at a station.
    pub fn counts(&self, station: usize) -> DemandCounts {
        let events = &self.stations[station];
        DemandCounts {
            incoming_charged: events.count(DemandType::IncomingCharged) as f64,
            incoming_flat: events.count(DemandType::IncomingFlat) as f64,
            outgoing_charged: events.count(DemandType::OutgoingCharged) as f64,
        }
    }
}

/// A fixed-size set of equally weighted scenarios over one horizon.
///
/// # Examples
///
/// ```
/// use u_rebalance::models::{DemandType, Scenario, ScenarioSet, StationEvents};
///
/// let busy = StationEvents::new().with_events(DemandType::OutgoingCharged, vec![0, 1, 1]);
/// let quiet = StationEvents::new().with_events(DemandType::OutgoingCharged, vec![2]);
/// let set = ScenarioSet::new(3, vec![Scenario::new(vec![busy]), Scenario::new(vec![quiet])]);
///
/// assert_eq!(set.len(), 2);
/// assert!((set.expected_counts(0).outgoing_charged - 2.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSet {
    horizon: u32,
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    /// Creates a scenario set.
    pub fn new(horizon: u32, scenarios: Vec<Scenario>) -> Self {
        Self { horizon, scenarios }
    }

    /// Horizon length in time steps.
    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// All scenarios.
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Scenario by index.
    pub fn get(&self, index: usize) -> Option<&Scenario> {
        self.scenarios.get(index)
    }

    /// Number of scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Returns `true` if the set holds no scenario.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Mean event counts at a station across scenarios.
    pub fn expected_counts(&self, station: usize) -> DemandCounts {
        if self.scenarios.is_empty() {
            return DemandCounts::default();
        }
        let n = self.scenarios.len() as f64;
        let mut total = DemandCounts::default();
        for scenario in &self.scenarios {
            let c = scenario.counts(station);
            total.incoming_charged += c.incoming_charged;
            total.incoming_flat += c.incoming_flat;
            total.outgoing_charged += c.outgoing_charged;
        }
        DemandCounts {
            incoming_charged: total.incoming_charged / n,
            incoming_flat: total.incoming_flat / n,
            outgoing_charged: total.outgoing_charged / n,
        }
    }
}
