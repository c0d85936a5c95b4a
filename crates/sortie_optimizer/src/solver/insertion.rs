use sortie_matrix::DistanceMatrix;

use crate::{
    problem::{MissionProblem, vehicle::VehicleIdx, waypoint::WaypointIdx},
    solver::solution::route::{Route, fits_budget},
};

#[derive(Clone, Debug, PartialEq)]
pub struct TargetInsertion {
    pub vehicle: VehicleIdx,
    pub target: WaypointIdx,

    /// Index of the target in the resulting waypoint sequence
    pub position: usize,

    /// End closing a route that has not left its start yet
    pub end: Option<WaypointIdx>,

    /// Marginal distance
    pub delta: f64,
}

/// Calls `f` for every position where `target` can be spliced into the
/// sequence of `vehicle` without moving a target after its last anchor.
/// Unreachable insertions are skipped.
pub fn for_each_insertion(
    problem: &MissionProblem,
    matrix: &DistanceMatrix,
    vehicle: VehicleIdx,
    waypoints: &[WaypointIdx],
    target: WaypointIdx,
    mut f: impl FnMut(TargetInsertion),
) {
    match waypoints {
        [] => {}
        [start] => {
            let to_target = matrix.distance(start.get(), target.get());

            for end in problem.end_candidates(vehicle) {
                let delta = to_target + matrix.distance(target.get(), end.get());

                if delta.is_finite() {
                    f(TargetInsertion {
                        vehicle,
                        target,
                        position: 1,
                        end: Some(end),
                        delta,
                    });
                }
            }
        }
        _ => {
            for position in 1..waypoints.len() {
                let previous = waypoints[position - 1].get();
                let next = waypoints[position].get();
                let delta = matrix.distance(previous, target.get())
                    + matrix.distance(target.get(), next)
                    - matrix.distance(previous, next);

                if delta.is_finite() {
                    f(TargetInsertion {
                        vehicle,
                        target,
                        position,
                        end: None,
                        delta,
                    });
                }
            }
        }
    }
}

/// Cheapest insertion of `target` into `route` that keeps it within `budget`.
/// Ties keep the earliest position.
pub fn best_insertion(
    problem: &MissionProblem,
    matrix: &DistanceMatrix,
    route: &Route,
    target: WaypointIdx,
    budget: f64,
) -> Option<TargetInsertion> {
    let mut best: Option<TargetInsertion> = None;

    for_each_insertion(
        problem,
        matrix,
        route.vehicle(),
        route.waypoints(),
        target,
        |insertion| {
            if fits_budget(route.distance() + insertion.delta, budget)
                && best
                    .as_ref()
                    .is_none_or(|best| insertion.delta < best.delta)
            {
                best = Some(insertion);
            }
        },
    );

    best
}

pub fn apply_insertion(
    problem: &MissionProblem,
    matrix: &DistanceMatrix,
    route: &Route,
    insertion: &TargetInsertion,
) -> Option<Route> {
    route.inserted(
        problem,
        matrix,
        insertion.position,
        insertion.target,
        insertion.end,
    )
}
