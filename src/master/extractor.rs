//! Decoding of the master assignment into per-vehicle plans.

use crate::error::PlanningError;
use crate::models::{MasterSolution, Quantities, QuantityKind, Station, Vehicle, VehiclePlan};
use crate::optimizer::{VarKey, VarKind};

use super::selector::{MasterAssignment, MasterCandidate};

/// Distance from 0 or 1 within which an indicator counts as integral.
pub const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Turns a solved master assignment into a [`MasterSolution`].
///
/// # Examples
///
/// ```
/// use u_rebalance::master::{MasterAssignment, MasterCandidate, SolutionExtractor};
/// use u_rebalance::models::{Pattern, QuantityKind, Station, Vehicle};
/// use u_rebalance::optimizer::{Assignment, VarKey, VarKind};
///
/// let stations = vec![Station::new(5, 10)];
/// let vehicles = vec![Vehicle::new(0, 5)];
/// let idle = MasterCandidate { route: 0, pattern: 0, loading: Pattern::idle(), target: 0, expected_gain: 0.0 };
///
/// let mut values = vec![(idle.key(0, 0), 1.0)];
/// values.extend(QuantityKind::ALL.map(|k| (VarKey::vehicle(VarKind::Quantity(k), 0), 0.0)));
/// let solved = MasterAssignment {
///     assignment: Assignment::from_values(values),
///     objective: 0.0,
///     optimal: true,
///     warning: None,
/// };
///
/// let solution = SolutionExtractor::new(&stations)
///     .extract(&vehicles, &[vec![idle]], &solved)
///     .unwrap();
/// assert_eq!(solution.plan_for(0).unwrap().target_station, 5);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SolutionExtractor<'a> {
    stations: &'a [Station],
}

impl<'a> SolutionExtractor<'a> {
    pub fn new(stations: &'a [Station]) -> Self {
        Self { stations }
    }

    /// Builds one plan per vehicle, in fleet order.
    ///
    /// # Errors
    ///
    /// [`PlanningError::MalformedSolutionData`] if an indicator is not
    /// integral, a vehicle does not have exactly one selected candidate, or a
    /// quantity is missing, not finite or negative.
    pub fn extract(
        &self,
        vehicles: &[Vehicle],
        candidates: &[Vec<MasterCandidate>],
        solved: &MasterAssignment,
    ) -> Result<MasterSolution, PlanningError> {
        let plans = vehicles
            .iter()
            .zip(candidates)
            .enumerate()
            .map(|(v, (vehicle, cands))| self.plan(v, vehicle, cands, solved))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MasterSolution::new(plans, solved.objective, solved.optimal))
    }

    fn plan(
        &self,
        v: usize,
        vehicle: &Vehicle,
        cands: &[MasterCandidate],
        solved: &MasterAssignment,
    ) -> Result<VehiclePlan, PlanningError> {
        if cands.is_empty() {
            return Ok(VehiclePlan::unavailable(vehicle.id(), vehicle.station_id()));
        }

        let mut selected = None;
        for (c, cand) in cands.iter().enumerate() {
            let x = value(solved, v, &cand.key(v, c))?;
            if x.abs() <= INTEGRALITY_TOLERANCE {
                continue;
            }
            if (x - 1.0).abs() > INTEGRALITY_TOLERANCE {
                return Err(malformed(v, format!("indicator {c} is fractional ({x})")));
            }
            if let Some(previous) = selected.replace(c) {
                return Err(malformed(v, format!("candidates {previous} and {c} both selected")));
            }
        }
        let c = selected.ok_or_else(|| malformed(v, "no candidate selected".to_string()))?;
        let cand = &cands[c];

        let mut quantities = Quantities::default();
        for kind in QuantityKind::ALL {
            let q = value(solved, v, &VarKey::vehicle(VarKind::Quantity(kind), v))?;
            if q < -INTEGRALITY_TOLERANCE {
                return Err(malformed(v, format!("{kind:?} is negative ({q})")));
            }
            quantities.set(kind, q.round().max(0.0) as u32);
        }

        let target = self
            .stations
            .get(cand.target)
            .ok_or_else(|| malformed(v, format!("unknown target index {}", cand.target)))?;

        Ok(VehiclePlan {
            vehicle_id: vehicle.id(),
            route: Some(cand.route),
            pattern: Some(cand.pattern),
            target_station: target.id(),
            quantities,
        })
    }
}

fn value(solved: &MasterAssignment, v: usize, key: &VarKey) -> Result<f64, PlanningError> {
    let x = solved
        .assignment
        .get(key)
        .ok_or_else(|| malformed(v, format!("missing value for {key}")))?;
    if !x.is_finite() {
        return Err(malformed(v, format!("{key} is not finite")));
    }
    Ok(x)
}

fn malformed(vehicle: usize, detail: String) -> PlanningError {
    PlanningError::MalformedSolutionData { vehicle, detail }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoadingMode, Pattern};
    use crate::optimizer::Assignment;

    fn stations() -> Vec<Station> {
        vec![Station::new(10, 5), Station::new(20, 5)]
    }

    fn cands() -> Vec<MasterCandidate> {
        vec![
            MasterCandidate {
                route: 0,
                pattern: 0,
                loading: Pattern::idle(),
                target: 0,
                expected_gain: 0.0,
            },
            MasterCandidate {
                route: 0,
                pattern: 1,
                loading: Pattern::new(LoadingMode::Full),
                target: 1,
                expected_gain: 1.0,
            },
        ]
    }

    fn solved(x: [f64; 2], q: [f64; 5]) -> MasterAssignment {
        let cands = cands();
        let mut values = vec![(cands[0].key(0, 0), x[0]), (cands[1].key(0, 1), x[1])];
        for (kind, value) in QuantityKind::ALL.into_iter().zip(q) {
            values.push((VarKey::vehicle(VarKind::Quantity(kind), 0), value));
        }
        MasterAssignment {
            assignment: Assignment::from_values(values),
            objective: 1.0,
            optimal: true,
            warning: None,
        }
    }

    fn extract(solved: &MasterAssignment) -> Result<MasterSolution, PlanningError> {
        let stations = stations();
        SolutionExtractor::new(&stations).extract(&[Vehicle::new(7, 10)], &[cands()], solved)
    }

    #[test]
    fn test_decodes_selection_and_rounds() {
        let s = extract(&solved([0.0, 1.0], [2.9999999, 0.0, 1.0000001, 0.0, 0.0])).expect("valid");
        let plan = s.plan_for(7).expect("plan");
        assert_eq!(plan.target_station, 20);
        assert_eq!(plan.pattern, Some(1));
        assert_eq!(plan.quantities.battery_swaps, 3);
        assert_eq!(plan.quantities.flat_pickup, 1);
        assert!(s.is_optimal());
    }

    #[test]
    fn test_near_integral_indicators_accepted() {
        let s = extract(&solved([1e-9, 1.0 - 1e-9], [0.0; 5])).expect("valid");
        assert_eq!(s.plan_for(7).expect("plan").route, Some(0));
    }

    #[test]
    fn test_tiny_negative_quantity_clamped() {
        let s = extract(&solved([1.0, 0.0], [-1e-9, 0.0, 0.0, 0.0, 0.0])).expect("valid");
        let plan = s.plan_for(7).expect("plan");
        assert!(plan.quantities.is_zero());
        assert_eq!(plan.target_station, 10);
    }

    #[test]
    fn test_fractional_indicator_rejected() {
        let err = extract(&solved([0.5, 0.5], [0.0; 5])).unwrap_err();
        assert!(matches!(err, PlanningError::MalformedSolutionData { vehicle: 0, .. }));
    }

    #[test]
    fn test_two_selected_rejected() {
        let err = extract(&solved([1.0, 1.0], [0.0; 5])).unwrap_err();
        assert!(matches!(err, PlanningError::MalformedSolutionData { .. }));
    }

    #[test]
    fn test_none_selected_rejected() {
        let err = extract(&solved([0.0, 0.0], [0.0; 5])).unwrap_err();
        assert!(matches!(err, PlanningError::MalformedSolutionData { .. }));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let err = extract(&solved([0.0, 1.0], [0.0, -1.0, 0.0, 0.0, 0.0])).unwrap_err();
        assert!(matches!(err, PlanningError::MalformedSolutionData { .. }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = extract(&solved([0.0, 1.0], [f64::NAN, 0.0, 0.0, 0.0, 0.0])).unwrap_err();
        assert!(matches!(err, PlanningError::MalformedSolutionData { .. }));
    }

    #[test]
    fn test_missing_quantity_rejected() {
        let cands = cands();
        let partial = MasterAssignment {
            assignment: Assignment::from_values([(cands[0].key(0, 0), 1.0), (cands[1].key(0, 1), 0.0)]),
            objective: 0.0,
            optimal: true,
            warning: None,
        };
        let err = extract(&partial).unwrap_err();
        assert!(matches!(err, PlanningError::MalformedSolutionData { .. }));
    }

    #[test]
    fn test_vehicle_without_candidates_stays() {
        let stations = stations();
        let empty = MasterAssignment {
            assignment: Assignment::default(),
            objective: 0.0,
            optimal: true,
            warning: None,
        };
        let s = SolutionExtractor::new(&stations)
            .extract(&[Vehicle::new(3, 20)], &[vec![]], &empty)
            .expect("valid");
        let plan = s.plan_for(3).expect("plan");
        assert!(!plan.has_plan());
        assert_eq!(plan.target_station, 20);
        assert!(plan.quantities.is_zero());
    }
}
