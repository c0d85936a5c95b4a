use sortie_matrix::geometry::polylines_cross;
use tracing::{debug, warn};

use crate::{
    problem::vehicle::VehicleIdx,
    solver::{
        orienteering::exact::TIE_EPSILON,
        solution::{
            Solution,
            optimization_log::OptimizationEvent,
            route::{Route, fits_budget, respects_order},
        },
        solver_params::SolverParams,
        two_opt::{TwoOptOperator, TwoOptParams},
    },
};

/// First 2-opt move that removes a crossing between two non adjacent legs and
/// shortens the route.
fn find_uncrossing(solution: &Solution, route: &Route) -> Option<(TwoOptParams, Route)> {
    let problem = solution.problem();
    let matrix = solution.matrix();
    let budget = problem.vehicle(route.vehicle()).fuel_budget();
    let legs = route.leg_count();

    for first in 0..legs {
        for second in first + 2..legs {
            if !polylines_cross(route.leg_trajectory(first), route.leg_trajectory(second)) {
                continue;
            }

            let params = TwoOptParams {
                from: first + 1,
                to: second,
            };
            let operator = TwoOptOperator::new(params);

            if !operator.is_valid(route.waypoints())
                || operator.delta(matrix, route.waypoints()) >= -TIE_EPSILON
            {
                continue;
            }

            let mut waypoints = route.waypoints().to_vec();
            operator.apply(&mut waypoints);

            let Some(candidate) = route.with_waypoints(problem, matrix, waypoints) else {
                continue;
            };

            if candidate.distance() < route.distance() - TIE_EPSILON
                && fits_budget(candidate.distance(), budget)
                && respects_order(problem, candidate.waypoints())
            {
                return Some((params, candidate));
            }
        }
    }

    None
}

/// Removes self crossings of every route with 2-opt reversals, at most
/// `max_crossing_iterations` per route.
///
/// Returns the number of reversals.
pub fn remove_crossings(solution: &mut Solution, params: &SolverParams) -> usize {
    let problem = solution.problem().clone();
    let mut uncrossings = 0;

    for vehicle in problem.vehicle_indices() {
        uncrossings += uncross_route(solution, params, vehicle);
    }

    uncrossings
}

fn uncross_route(solution: &mut Solution, params: &SolverParams, vehicle: VehicleIdx) -> usize {
    let mut iterations = 0;

    while iterations < params.max_crossing_iterations {
        let route = solution.route(vehicle);
        let Some((two_opt, uncrossed)) = find_uncrossing(solution, route) else {
            return iterations;
        };

        let vehicle_id = solution.problem().vehicle(vehicle).id().to_owned();
        let distance_before = route.distance();
        let distance_after = uncrossed.distance();

        debug!(
            vehicle = vehicle_id,
            from = two_opt.from,
            to = two_opt.to,
            distance_before,
            distance_after,
            "Removed crossing"
        );

        solution.log_mut().push(OptimizationEvent::Uncross {
            vehicle: vehicle_id,
            from: two_opt.from,
            to: two_opt.to,
            distance_before,
            distance_after,
        });
        solution.set_route(uncrossed);
        iterations += 1;
    }

    warn!(
        vehicle = solution.problem().vehicle(vehicle).id(),
        iterations, "Crossing removal stopped at its iteration cap"
    );

    iterations
}
