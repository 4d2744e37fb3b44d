//! Station type and canonical station index.

use std::collections::HashMap;

use crate::error::PlanningError;

/// Customer demand type observed at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemandType {
    /// Customers returning a charged bike.
    IncomingCharged,
    /// Customers returning a flat bike.
    IncomingFlat,
    /// Customers renting a charged bike.
    OutgoingCharged,
}

impl DemandType {
    /// All demand types in canonical order.
    pub const ALL: [DemandType; 3] = [
        DemandType::IncomingCharged,
        DemandType::IncomingFlat,
        DemandType::OutgoingCharged,
    ];
}

/// A bike-share dock with capacities, inventories and demand rates.
///
/// Rates are expected events per time step. Capacities cover all docks
/// (`capacity`) as well as charged and flat slots separately; by default the
/// slot capacities equal the total capacity. `value` is credited to every
/// route that visits the station. A depot refills the vehicle's battery
/// compartment and takes no battery swaps.
///
/// # Examples
///
/// ```
/// use u_rebalance::models::Station;
///
/// let s = Station::new(3, 20)
///     .with_location(1.0, 2.0)
///     .with_loads(5, 2)
///     .with_rates(0.5, 0.1, 1.0)
///     .with_charging(true)
///     .with_value(2.5);
/// assert_eq!(s.id(), 3);
/// assert_eq!(s.value(), 2.5);
/// assert_eq!(s.free_docks(), 13);
/// assert!(s.is_charging());
/// assert!(s.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    id: usize,
    x: f64,
    y: f64,
    incoming_charged_rate: f64,
    incoming_flat_rate: f64,
    outgoing_charged_rate: f64,
    capacity: u32,
    charged_capacity: u32,
    flat_capacity: u32,
    charged_load: u32,
    flat_load: u32,
    charging: bool,
    depot: bool,
    value: f64,
}

impl Station {
    /// Creates an empty station with the given dock capacity.
    ///
    /// Default: located at the origin, no demand, no bikes, not charging,
    /// not a depot, zero value.
    pub fn new(id: usize, capacity: u32) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            incoming_charged_rate: 0.0,
            incoming_flat_rate: 0.0,
            outgoing_charged_rate: 0.0,
            capacity,
            charged_capacity: capacity,
            flat_capacity: capacity,
            charged_load: 0,
            flat_load: 0,
            charging: false,
            depot: false,
            value: 0.0,
        }
    }

    /// Sets planar coordinates.
    pub fn with_location(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Sets demand rates (incoming charged, incoming flat, outgoing charged).
    pub fn with_rates(mut self, incoming_charged: f64, incoming_flat: f64, outgoing_charged: f64) -> Self {
        self.incoming_charged_rate = incoming_charged;
        self.incoming_flat_rate = incoming_flat;
        self.outgoing_charged_rate = outgoing_charged;
        self
    }

    /// Sets charged-slot and flat-slot capacities.
    pub fn with_slot_capacities(mut self, charged: u32, flat: u32) -> Self {
        self.charged_capacity = charged;
        self.flat_capacity = flat;
        self
    }

    /// Sets current charged and flat bike counts.
    pub fn with_loads(mut self, charged: u32, flat: u32) -> Self {
        self.charged_load = charged;
        self.flat_load = flat;
        self
    }

    /// Marks the station as charging-capable.
    pub fn with_charging(mut self, charging: bool) -> Self {
        self.charging = charging;
        self
    }

    /// Marks the station as the battery depot.
    pub fn with_depot(mut self, depot: bool) -> Self {
        self.depot = depot;
        self
    }

    /// Sets the value credited per visit (`V_B`).
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    /// Station ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// X-coordinate.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Y-coordinate.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Expected events per time step for the given demand type.
    pub fn rate(&self, demand: DemandType) -> f64 {
        match demand {
            DemandType::IncomingCharged => self.incoming_charged_rate,
            DemandType::IncomingFlat => self.incoming_flat_rate,
            DemandType::OutgoingCharged => self.outgoing_charged_rate,
        }
    }

    /// Total dock capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Capacity for charged bikes.
    pub fn charged_capacity(&self) -> u32 {
        self.charged_capacity
    }

    /// Capacity for flat bikes.
    pub fn flat_capacity(&self) -> u32 {
        self.flat_capacity
    }

    /// Charged bikes currently docked.
    pub fn charged_load(&self) -> u32 {
        self.charged_load
    }

    /// Flat bikes currently docked.
    pub fn flat_load(&self) -> u32 {
        self.flat_load
    }

    /// Whether the station charges docked bikes.
    pub fn is_charging(&self) -> bool {
        self.charging
    }

    /// Whether the vehicle's batteries are refilled here.
    pub fn is_depot(&self) -> bool {
        self.depot
    }

    /// Value credited to a route visiting the station.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Charged plus flat bikes docked.
    pub fn total_load(&self) -> u64 {
        u64::from(self.charged_load) + u64::from(self.flat_load)
    }

    /// Docks not occupied by any bike.
    pub fn free_docks(&self) -> u32 {
        self.capacity
            .saturating_sub(self.charged_load)
            .saturating_sub(self.flat_load)
    }

    /// Euclidean distance to another station.
    pub fn distance_to(&self, other: &Station) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Checks rates, value and loads.
    ///
    /// Rates must be finite and non-negative and the value finite; loads must
    /// fit the slot capacities and, together, the dock capacity.
    pub fn validate(&self) -> Result<(), PlanningError> {
        for demand in DemandType::ALL {
            let rate = self.rate(demand);
            if !rate.is_finite() || rate < 0.0 {
                return Err(PlanningError::Configuration(format!(
                    "station {}: {demand:?} rate {rate} must be finite and >= 0",
                    self.id
                )));
            }
        }
        if !self.value.is_finite() {
            return Err(PlanningError::Configuration(format!(
                "station {}: value {} must be finite",
                self.id, self.value
            )));
        }
        if self.charged_load > self.charged_capacity {
            return Err(PlanningError::Configuration(format!(
                "station {}: charged load {} exceeds charged capacity {}",
                self.id, self.charged_load, self.charged_capacity
            )));
        }
        if self.flat_load > self.flat_capacity {
            return Err(PlanningError::Configuration(format!(
                "station {}: flat load {} exceeds flat capacity {}",
                self.id, self.flat_load, self.flat_capacity
            )));
        }
        if self.total_load() > u64::from(self.capacity) {
            return Err(PlanningError::Configuration(format!(
                "station {}: load {} exceeds capacity {}",
                self.id,
                self.total_load(),
                self.capacity
            )));
        }
        Ok(())
    }
}

/// Maps station IDs to positions in the canonical station list.
///
/// # Examples
///
/// ```
/// use u_rebalance::models::{Station, StationIndex};
///
/// let stations = vec![Station::new(10, 5), Station::new(4, 5)];
/// let index = StationIndex::new(&stations).unwrap();
/// assert_eq!(index.get(4), Some(1));
/// assert_eq!(index.get(7), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StationIndex {
    positions: HashMap<usize, usize>,
}

impl StationIndex {
    /// Builds the index, rejecting duplicate IDs.
    pub fn new(stations: &[Station]) -> Result<Self, PlanningError> {
        let mut positions = HashMap::with_capacity(stations.len());
        for (pos, station) in stations.iter().enumerate() {
            if positions.insert(station.id(), pos).is_some() {
                return Err(PlanningError::Configuration(format!(
                    "duplicate station id {}",
                    station.id()
                )));
            }
        }
        Ok(Self { positions })
    }

    /// Position of the station with the given ID.
    pub fn get(&self, id: usize) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Position of the station with the given ID, or a configuration error.
    pub fn position(&self, id: usize) -> Result<usize, PlanningError> {
        self.get(id)
            .ok_or_else(|| PlanningError::Configuration(format!("unknown station id {id}")))
    }

    /// Number of indexed stations.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if no stations are indexed.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
