//! Quantity and solution types produced by a planning run.

/// One of the five per-station operation quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuantityKind {
    /// Flat bikes whose battery is swapped for a charged one (`q_B`).
    BatterySwap,
    /// Charged bikes loaded onto the vehicle (`q_CCL`).
    ChargedPickup,
    /// Flat bikes loaded onto the vehicle (`q_FCL`).
    FlatPickup,
    /// Charged bikes unloaded at the station (`q_CCU`).
    ChargedDelivery,
    /// Flat bikes unloaded at the station (`q_FCU`).
    FlatDelivery,
}

impl QuantityKind {
    /// All kinds in output order.
    pub const ALL: [QuantityKind; 5] = [
        QuantityKind::BatterySwap,
        QuantityKind::ChargedPickup,
        QuantityKind::FlatPickup,
        QuantityKind::ChargedDelivery,
        QuantityKind::FlatDelivery,
    ];
}

/// The five integer quantities decided at a target station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Quantities {
    /// Battery swaps (`q_B`).
    pub battery_swaps: u32,
    /// Charged bikes picked up (`q_CCL`).
    pub charged_pickup: u32,
    /// Flat bikes picked up (`q_FCL`).
    pub flat_pickup: u32,
    /// Charged bikes delivered (`q_CCU`).
    pub charged_delivery: u32,
    /// Flat bikes delivered (`q_FCU`).
    pub flat_delivery: u32,
}

impl Quantities {
    /// Quantity of the given kind.
    pub fn get(&self, kind: QuantityKind) -> u32 {
        match kind {
            QuantityKind::BatterySwap => self.battery_swaps,
            QuantityKind::ChargedPickup => self.charged_pickup,
            QuantityKind::FlatPickup => self.flat_pickup,
            QuantityKind::ChargedDelivery => self.charged_delivery,
            QuantityKind::FlatDelivery => self.flat_delivery,
        }
    }

    /// Sets the quantity of the given kind.
    pub fn set(&mut self, kind: QuantityKind, value: u32) {
        match kind {
            QuantityKind::BatterySwap => self.battery_swaps = value,
            QuantityKind::ChargedPickup => self.charged_pickup = value,
            QuantityKind::FlatPickup => self.flat_pickup = value,
            QuantityKind::ChargedDelivery => self.charged_delivery = value,
            QuantityKind::FlatDelivery => self.flat_delivery = value,
        }
    }

    /// Values in [`QuantityKind::ALL`] order.
    pub fn to_array(&self) -> [u32; 5] {
        QuantityKind::ALL.map(|k| self.get(k))
    }

    /// Returns `true` if every quantity is zero.
    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&q| q == 0)
    }
}

/// The decision for one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehiclePlan {
    /// Vehicle ID.
    pub vehicle_id: usize,
    /// Selected route index, `None` if the vehicle had no candidates.
    pub route: Option<usize>,
    /// Selected pattern index within the route.
    pub pattern: Option<usize>,
    /// ID of the station the vehicle should drive to next.
    pub target_station: usize,
    /// Quantities at the target station.
    pub quantities: Quantities,
}

impl VehiclePlan {
    /// A plan for a vehicle with no available candidate: stay, do nothing.
    pub fn unavailable(vehicle_id: usize, station_id: usize) -> Self {
        Self {
            vehicle_id,
            route: None,
            pattern: None,
            target_station: station_id,
            quantities: Quantities::default(),
        }
    }

    /// Returns `true` if a candidate was selected for this vehicle.
    pub fn has_plan(&self) -> bool {
        self.route.is_some()
    }
}

/// Fleet-wide selection: one plan per vehicle, in fleet order.
///
/// # Examples
///
/// ```
/// use u_rebalance::models::{MasterSolution, VehiclePlan};
///
/// let sol = MasterSolution::new(vec![VehiclePlan::unavailable(3, 1)], 0.0, true);
/// assert_eq!(sol.len(), 1);
/// assert!(!sol.plan_for(3).unwrap().has_plan());
/// assert!(sol.plan_for(4).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MasterSolution {
    plans: Vec<VehiclePlan>,
    objective: f64,
    optimal: bool,
}

impl MasterSolution {
    /// Creates a solution.
    pub fn new(plans: Vec<VehiclePlan>, objective: f64, optimal: bool) -> Self {
        Self {
            plans,
            objective,
            optimal,
        }
    }

    /// Plans in fleet order.
    pub fn plans(&self) -> &[VehiclePlan] {
        &self.plans
    }

    /// Plan for the vehicle with the given ID.
    pub fn plan_for(&self, vehicle_id: usize) -> Option<&VehiclePlan> {
        self.plans.iter().find(|p| p.vehicle_id == vehicle_id)
    }

    /// Number of plans.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Returns `true` if there are no plans.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Master objective value (expected reward).
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// `false` if the master solve stopped at its time limit.
    pub fn is_optimal(&self) -> bool {
        self.optimal
    }
}
