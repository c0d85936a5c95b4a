use sortie_matrix::DistanceMatrix;

use crate::problem::waypoint::WaypointIdx;

/// **Intra-Route 2-Opt**
///
/// Reverses the sequence of waypoints between `from` and `to` (inclusive).
/// This eliminates crossing legs within a single route.
///
/// ```text
/// BEFORE:
///    ... (prev) --x--> [from] -> ... -> [to] --x--> (next) ...
///          ^             ^               ^            ^
///          A             B               C            D
///
/// AFTER (Sequence Reversed):
///    ... (prev) -----> [to] -> ... -> [from] -----> (next) ...
///          ^             ^               ^            ^
///          A             C               B            D
///
/// Legs Removed: (prev->from), (to->next)
/// Legs Added:   (prev->to),   (from->next)
/// ```
///
/// The first and last waypoints never move, so the route keeps its start
/// and its final anchor.
#[derive(Debug)]
pub struct TwoOptOperator {
    params: TwoOptParams,
}

#[derive(Debug, Clone, Copy)]
pub struct TwoOptParams {
    pub from: usize,
    pub to: usize,
}

impl TwoOptOperator {
    pub fn new(params: TwoOptParams) -> Self {
        debug_assert!(params.from < params.to, "TwoOpt: cannot have from >= to");

        TwoOptOperator { params }
    }

    pub fn params(&self) -> TwoOptParams {
        self.params
    }

    pub fn is_valid(&self, waypoints: &[WaypointIdx]) -> bool {
        self.params.from >= 1
            && self.params.from < self.params.to
            && self.params.to + 1 < waypoints.len()
    }

    /// Distance change of the reversal. Legs inside the reversed segment keep
    /// their length since the matrix is symmetric.
    pub fn delta(&self, matrix: &DistanceMatrix, waypoints: &[WaypointIdx]) -> f64 {
        let prev = waypoints[self.params.from - 1].get();
        let from = waypoints[self.params.from].get();
        let to = waypoints[self.params.to].get();
        let next = waypoints[self.params.to + 1].get();

        let current_cost = matrix.distance(prev, from) + matrix.distance(to, next);
        let new_cost = matrix.distance(prev, to) + matrix.distance(from, next);

        new_cost - current_cost
    }

    pub fn apply(&self, waypoints: &mut [WaypointIdx]) {
        waypoints[self.params.from..=self.params.to].reverse();
    }
}
