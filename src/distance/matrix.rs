//! Dense travel time matrix.

use crate::models::Station;

/// A dense n×n travel time matrix stored in row-major order.
///
/// Indexed by canonical station position. Supports Euclidean travel times
/// computed from station coordinates or given explicitly.
///
/// # Examples
///
/// ```
/// use u_rebalance::models::Station;
/// use u_rebalance::distance::TravelTimeMatrix;
///
/// let stations = vec![
///     Station::new(0, 10),
///     Station::new(1, 10).with_location(3.0, 4.0),
///     Station::new(2, 10).with_location(6.0, 8.0),
/// ];
/// let tm = TravelTimeMatrix::from_stations(&stations, 2.0);
/// assert!((tm.get(0, 1) - 2.5).abs() < 1e-10);
/// assert_eq!(tm.size(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct TravelTimeMatrix {
    data: Vec<f64>,
    size: usize,
}

impl TravelTimeMatrix {
    /// Creates a matrix of the given size, initialized to zero.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0.0; size * size],
            size,
        }
    }

    /// Computes Euclidean travel times at the given speed.
    pub fn from_stations(stations: &[Station], speed: f64) -> Self {
        let n = stations.len();
        let mut tm = Self::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                let t = stations[i].distance_to(&stations[j]) / speed;
                tm.set(i, j, t);
                tm.set(j, i, t);
            }
        }
        tm
    }

    /// Creates a matrix from an explicit n×n grid.
    ///
    /// Returns `None` if the data length doesn't match `size * size`.
    pub fn from_data(size: usize, data: Vec<f64>) -> Option<Self> {
        if data.len() != size * size {
            return None;
        }
        Some(Self { data, size })
    }

    /// Returns the travel time from station `from` to station `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.size + to]
    }

    /// Sets the travel time from station `from` to station `to`.
    pub fn set(&mut self, from: usize, to: usize, time: f64) {
        self.data[from * self.size + to] = time;
    }

    /// Number of stations in this matrix.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns up to `k` candidates ordered by travel time from `from`.
    ///
    /// Ties are broken by station index so the order is deterministic.
    pub fn nearest(&self, from: usize, candidates: &[usize], k: usize) -> Vec<usize> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by(|&a, &b| {
            self.get(from, a)
                .total_cmp(&self.get(from, b))
                .then(a.cmp(&b))
        });
        sorted.truncate(k);
        sorted
    }
}
