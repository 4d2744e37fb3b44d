//! Rebalancing vehicle with cargo capacities and loads.

use crate::error::PlanningError;

/// Cargo carried by a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cargo {
    /// Charged replacement batteries.
    Battery,
    /// Charged bikes.
    ChargedBike,
    /// Flat bikes.
    FlatBike,
}

impl Cargo {
    /// All cargo kinds.
    pub const ALL: [Cargo; 3] = [Cargo::Battery, Cargo::ChargedBike, Cargo::FlatBike];
}

/// A rebalancing truck positioned at a station.
///
/// Charged and flat bikes share `bike_capacity`; batteries have their own
/// compartment, refilled to `battery_capacity` at a depot.
///
/// # Examples
///
/// ```
/// use u_rebalance::models::Vehicle;
///
/// let v = Vehicle::new(0, 4)
///     .with_capacities(10, 8)
///     .with_loads(6, 2, 1);
/// assert_eq!(v.station_id(), 4);
/// assert_eq!(v.bike_load(), 3);
/// assert_eq!(v.free_bike_slots(), 5);
/// assert!(v.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    id: usize,
    station_id: usize,
    battery_capacity: u32,
    bike_capacity: u32,
    battery_load: u32,
    charged_load: u32,
    flat_load: u32,
}

impl Vehicle {
    /// Creates an empty vehicle with no capacity at the given station.
    pub fn new(id: usize, station_id: usize) -> Self {
        Self {
            id,
            station_id,
            battery_capacity: 0,
            bike_capacity: 0,
            battery_load: 0,
            charged_load: 0,
            flat_load: 0,
        }
    }

    /// Sets battery and bike capacities.
    pub fn with_capacities(mut self, battery: u32, bike: u32) -> Self {
        self.battery_capacity = battery;
        self.bike_capacity = bike;
        self
    }

    /// Sets current battery, charged-bike and flat-bike loads.
    pub fn with_loads(mut self, battery: u32, charged: u32, flat: u32) -> Self {
        self.battery_load = battery;
        self.charged_load = charged;
        self.flat_load = flat;
        self
    }

    /// Vehicle ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// ID of the station the vehicle is currently at.
    pub fn station_id(&self) -> usize {
        self.station_id
    }

    /// Battery compartment capacity.
    pub fn battery_capacity(&self) -> u32 {
        self.battery_capacity
    }

    /// Bike capacity shared by charged and flat bikes.
    pub fn bike_capacity(&self) -> u32 {
        self.bike_capacity
    }

    /// Current load of the given cargo.
    pub fn load(&self, cargo: Cargo) -> u32 {
        match cargo {
            Cargo::Battery => self.battery_load,
            Cargo::ChargedBike => self.charged_load,
            Cargo::FlatBike => self.flat_load,
        }
    }

    /// Charged plus flat bikes on board.
    pub fn bike_load(&self) -> u64 {
        u64::from(self.charged_load) + u64::from(self.flat_load)
    }

    /// Bike slots still free.
    pub fn free_bike_slots(&self) -> u32 {
        self.bike_capacity
            .saturating_sub(self.charged_load)
            .saturating_sub(self.flat_load)
    }

    /// Checks that loads fit the capacities.
    pub fn validate(&self) -> Result<(), PlanningError> {
        if self.battery_load > self.battery_capacity {
            return Err(PlanningError::Configuration(format!(
                "vehicle {}: battery load {} exceeds capacity {}",
                self.id, self.battery_load, self.battery_capacity
            )));
        }
        if self.bike_load() > u64::from(self.bike_capacity) {
            return Err(PlanningError::Configuration(format!(
                "vehicle {}: bike load {} exceeds capacity {}",
                self.id,
                self.bike_load(),
                self.bike_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_new() {
        let v = Vehicle::new(0, 2);
        assert_eq!(v.id(), 0);
        assert_eq!(v.station_id(), 2);
        assert_eq!(v.battery_capacity(), 0);
        assert_eq!(v.bike_capacity(), 0);
        for c in Cargo::ALL {
            assert_eq!(v.load(c), 0);
        }
        assert!(v.validate().is_ok());
    }

    #[test]
    fn test_vehicle_builder() {
        let v = Vehicle::new(1, 0).with_capacities(12, 20).with_loads(4, 5, 6);
        assert_eq!(v.battery_capacity(), 12);
        assert_eq!(v.bike_capacity(), 20);
        assert_eq!(v.load(Cargo::Battery), 4);
        assert_eq!(v.load(Cargo::ChargedBike), 5);
        assert_eq!(v.load(Cargo::FlatBike), 6);
        assert_eq!(v.bike_load(), 11);
        assert_eq!(v.free_bike_slots(), 9);
    }

    #[test]
    fn test_vehicle_battery_overload() {
        let v = Vehicle::new(0, 0).with_capacities(5, 5).with_loads(6, 0, 0);
        assert!(matches!(v.validate(), Err(PlanningError::Configuration(_))));
    }

    #[test]
    fn test_vehicle_bike_overload() {
        let v = Vehicle::new(0, 0).with_capacities(5, 5).with_loads(0, 3, 3);
        assert!(v.validate().is_err());
    }

    #[test]
    fn test_huge_bike_loads_do_not_overflow() {
        let v = Vehicle::new(0, 0)
            .with_capacities(0, u32::MAX)
            .with_loads(0, u32::MAX, u32::MAX);
        assert_eq!(v.bike_load(), 2 * u64::from(u32::MAX));
        assert_eq!(v.free_bike_slots(), 0);
        assert!(v.validate().is_err());
    }
}
