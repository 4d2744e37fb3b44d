//! Per-vehicle score storage.

use super::subproblem::INFEASIBLE_SCORE;

/// Scores of one vehicle's candidates, indexed `[route][pattern][scenario]`.
///
/// Scenarios are equally weighted, so a candidate's expected score is the
/// arithmetic mean of its row. Candidates are compared through
/// [`expected_gain`](Self::expected_gain), their mean improvement over a
/// baseline pattern of the same route, so stops the vehicle merely passes
/// contribute the same to every pattern of a route.
///
/// # Examples
///
/// ```
/// use u_rebalance::evaluation::ScoreTable;
///
/// let table = ScoreTable::new(vec![vec![vec![1.0, 3.0], vec![0.0, 0.0]]]);
/// assert_eq!(table.route_count(), 1);
/// assert_eq!(table.pattern_count(0), 2);
/// assert!((table.expected(0, 0) - 2.0).abs() < 1e-10);
/// assert!((table.expected_gain(0, 0, 1) - 2.0).abs() < 1e-10);
/// assert_eq!(table.get(0, 0, 1), Some(3.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    scores: Vec<Vec<Vec<f64>>>,
}

impl ScoreTable {
    pub fn new(scores: Vec<Vec<Vec<f64>>>) -> Self {
        Self { scores }
    }

    /// Builds a table by calling `score(route, pattern, scenario)` for every cell.
    pub fn from_fn(
        patterns_per_route: &[usize],
        scenario_count: usize,
        mut score: impl FnMut(usize, usize, usize) -> f64,
    ) -> Self {
        let mut scores = Vec::with_capacity(patterns_per_route.len());
        for (r, &patterns) in patterns_per_route.iter().enumerate() {
            let mut rows: Vec<Vec<f64>> = Vec::with_capacity(patterns);
            for p in 0..patterns {
                rows.push((0..scenario_count).map(|s| score(r, p, s)).collect());
            }
            scores.push(rows);
        }
        Self { scores }
    }

    /// Score of one cell.
    pub fn get(&self, route: usize, pattern: usize, scenario: usize) -> Option<f64> {
        self.scores.get(route)?.get(pattern)?.get(scenario).copied()
    }

    /// All scenario scores of one candidate.
    pub fn scenario_scores(&self, route: usize, pattern: usize) -> &[f64] {
        &self.scores[route][pattern]
    }

    /// Mean score over scenarios; 0 when no scenario was scored.
    pub fn expected(&self, route: usize, pattern: usize) -> f64 {
        let row = self.scenario_scores(route, pattern);
        if row.is_empty() {
            return 0.0;
        }
        row.iter().sum::<f64>() / row.len() as f64
    }

    /// Mean over scenarios of `score(pattern) - score(baseline)` on one route.
    ///
    /// The baseline gains 0. A scenario in which either subproblem has no
    /// usable score counts as [`INFEASIBLE_SCORE`].
    pub fn expected_gain(&self, route: usize, pattern: usize, baseline: usize) -> f64 {
        if pattern == baseline {
            return 0.0;
        }
        let row = self.scenario_scores(route, pattern);
        if row.is_empty() {
            return 0.0;
        }
        let base = self.scenario_scores(route, baseline);
        let total: f64 = row
            .iter()
            .zip(base)
            .map(|(&score, &reference)| {
                if score == INFEASIBLE_SCORE || reference == INFEASIBLE_SCORE {
                    INFEASIBLE_SCORE
                } else {
                    score - reference
                }
            })
            .sum();
        total / row.len() as f64
    }

    pub fn route_count(&self) -> usize {
        self.scores.len()
    }

    pub fn pattern_count(&self, route: usize) -> usize {
        self.scores.get(route).map_or(0, Vec::len)
    }

    /// Returns `true` if the vehicle has no candidates.
    pub fn is_empty(&self) -> bool {
        self.scores.iter().all(Vec::is_empty)
    }
}
