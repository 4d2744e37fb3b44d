//! Route and loading pattern types.

use super::QuantityKind;

/// An ordered, loop-free sequence of canonical station indices.
///
/// The first station is where the vehicle currently stands; the second is
/// the route's target, the station the vehicle drives to next.
///
/// # Examples
///
/// ```
/// use u_rebalance::models::Route;
///
/// let route = Route::new(2).extended(0, 4.0).extended(5, 3.0);
/// assert_eq!(route.stations(), &[2, 0, 5]);
/// assert_eq!(route.target(), Some(0));
/// assert_eq!(route.visited(), &[0, 5]);
/// assert!((route.travel_time() - 7.0).abs() < 1e-10);
///
/// assert!(Route::from_stations(vec![1, 3, 1]).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    stations: Vec<usize>,
    travel_time: f64,
}

impl Route {
    /// Creates a route holding only its start station.
    pub fn new(start: usize) -> Self {
        Self {
            stations: vec![start],
            travel_time: 0.0,
        }
    }

    /// Creates a route from an explicit station sequence.
    ///
    /// Returns `None` if the sequence is empty or repeats a station.
    pub fn from_stations(stations: Vec<usize>) -> Option<Self> {
        let (&start, rest) = stations.split_first()?;
        let mut route = Self::new(start);
        for &s in rest {
            if route.contains(s) {
                return None;
            }
            route.stations.push(s);
        }
        Some(route)
    }

    /// Returns a copy of this route with `station` appended.
    ///
    /// The caller guarantees `station` is not already on the route.
    pub fn extended(&self, station: usize, travel: f64) -> Self {
        debug_assert!(!self.contains(station));
        let mut stations = Vec::with_capacity(self.stations.len() + 1);
        stations.extend_from_slice(&self.stations);
        stations.push(station);
        Self {
            stations,
            travel_time: self.travel_time + travel,
        }
    }

    /// All stations in visiting order, start included.
    pub fn stations(&self) -> &[usize] {
        &self.stations
    }

    /// The station the vehicle starts from.
    pub fn start(&self) -> usize {
        self.stations[0]
    }

    /// The last station on the route.
    pub fn last(&self) -> usize {
        self.stations[self.stations.len() - 1]
    }

    /// The next station the vehicle drives to, if any.
    pub fn target(&self) -> Option<usize> {
        self.stations.get(1).copied()
    }

    /// Stations visited after the start.
    pub fn visited(&self) -> &[usize] {
        &self.stations[1..]
    }

    /// Number of stations including the start.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Returns `true` if the route has no stop besides its start.
    pub fn is_empty(&self) -> bool {
        self.stations.len() <= 1
    }

    /// Returns `true` if `station` is on the route.
    pub fn contains(&self, station: usize) -> bool {
        self.stations.contains(&station)
    }

    /// Cumulative travel time from the start to the last station.
    pub fn travel_time(&self) -> f64 {
        self.travel_time
    }
}

/// Which quantity families a subproblem may use along a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingMode {
    /// No operation; the vehicle stays where it is.
    Idle,
    /// Battery swaps only.
    BatterySwap,
    /// Charged-bike pickups and deliveries only.
    ChargedTransfer,
    /// Flat-bike pickups and deliveries only.
    FlatTransfer,
    /// Every operation.
    Full,
}

impl LoadingMode {
    /// Returns `true` if this mode enables the given quantity.
    pub fn allows(&self, kind: QuantityKind) -> bool {
        match self {
            LoadingMode::Idle => false,
            LoadingMode::BatterySwap => kind == QuantityKind::BatterySwap,
            LoadingMode::ChargedTransfer => matches!(
                kind,
                QuantityKind::ChargedPickup | QuantityKind::ChargedDelivery
            ),
            LoadingMode::FlatTransfer => {
                matches!(kind, QuantityKind::FlatPickup | QuantityKind::FlatDelivery)
            }
            LoadingMode::Full => true,
        }
    }
}

/// A discrete loading structure applied to one route.
///
/// # Examples
///
/// ```
/// use u_rebalance::models::{LoadingMode, Pattern, QuantityKind};
///
/// let p = Pattern::new(LoadingMode::BatterySwap);
/// assert!(p.allows(QuantityKind::BatterySwap));
/// assert!(!p.allows(QuantityKind::FlatDelivery));
/// assert!(!p.is_idle());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pattern {
    mode: LoadingMode,
}

impl Pattern {
    /// Creates a pattern with the given loading mode.
    pub fn new(mode: LoadingMode) -> Self {
        Self { mode }
    }

    /// The do-nothing pattern.
    pub fn idle() -> Self {
        Self::new(LoadingMode::Idle)
    }

    /// Loading mode.
    pub fn mode(&self) -> LoadingMode {
        self.mode
    }

    /// Returns `true` for the do-nothing pattern.
    pub fn is_idle(&self) -> bool {
        self.mode == LoadingMode::Idle
    }

    /// Returns `true` if the pattern enables the given quantity.
    pub fn allows(&self, kind: QuantityKind) -> bool {
        self.mode.allows(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_new() {
        let r = Route::new(4);
        assert!(r.is_empty());
        assert_eq!(r.len(), 1);
        assert_eq!(r.start(), 4);
        assert_eq!(r.last(), 4);
        assert_eq!(r.target(), None);
        assert!(r.visited().is_empty());
        assert_eq!(r.travel_time(), 0.0);
    }

    #[test]
    fn test_route_extended_keeps_original() {
        let r = Route::new(0);
        let r2 = r.extended(3, 2.5);
        assert_eq!(r.len(), 1);
        assert_eq!(r2.stations(), &[0, 3]);
        assert_eq!(r2.last(), 3);
        assert!(!r2.is_empty());
        assert!((r2.travel_time() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_route_from_stations() {
        let r = Route::from_stations(vec![1, 2, 3]).expect("loop-free");
        assert_eq!(r.start(), 1);
        assert_eq!(r.target(), Some(2));
        assert!(r.contains(3));
        assert!(!r.contains(4));
        assert!(Route::from_stations(vec![]).is_none());
        assert!(Route::from_stations(vec![1, 1]).is_none());
    }

    #[test]
    fn test_idle_allows_nothing() {
        let p = Pattern::idle();
        assert!(p.is_idle());
        for kind in QuantityKind::ALL {
            assert!(!p.allows(kind));
        }
    }

    #[test]
    fn test_full_allows_everything() {
        let p = Pattern::new(LoadingMode::Full);
        for kind in QuantityKind::ALL {
            assert!(p.allows(kind));
        }
    }

    #[test]
    fn test_transfer_modes() {
        let charged = Pattern::new(LoadingMode::ChargedTransfer);
        assert!(charged.allows(QuantityKind::ChargedPickup));
        assert!(charged.allows(QuantityKind::ChargedDelivery));
        assert!(!charged.allows(QuantityKind::FlatPickup));
        assert!(!charged.allows(QuantityKind::BatterySwap));

        let flat = Pattern::new(LoadingMode::FlatTransfer);
        assert!(flat.allows(QuantityKind::FlatPickup));
        assert!(flat.allows(QuantityKind::FlatDelivery));
        assert!(!flat.allows(QuantityKind::ChargedDelivery));
    }
}
