use geo::Coord;
use sortie_matrix::geometry::{euclidean_distance, nearest_segment};
use tracing::{debug, warn};

use crate::{
    problem::{vehicle::VehicleIdx, waypoint::WaypointIdx},
    solver::{
        allocator::is_accessible,
        solution::{
            Solution,
            optimization_log::OptimizationEvent,
            route::{Route, RouteOrigin, fits_budget, respects_order},
        },
        solver_params::SolverParams,
    },
};

struct Migration {
    to_vehicle: VehicleIdx,
    to_route: Route,
    osd: f64,
}

/// Distance from `p` to a polyline, a single vertex counts as a point.
fn distance_to_polyline(p: Coord, polyline: &[Coord]) -> f64 {
    match nearest_segment(p, polyline) {
        Some((_, distance)) => distance,
        None => polyline
            .first()
            .map_or(f64::INFINITY, |&vertex| euclidean_distance(p, vertex)),
    }
}

/// Moves targets to the vehicle whose trajectory passes closest to them.
///
/// The SSD of a target is its distance to the leg its vehicle would fly if
/// the target were dropped. The OSD is its distance to the nearest segment of
/// another vehicle's trajectory. A target migrates when `SSD - OSD` exceeds
/// `swap_min_gain` and both vehicles stay within their budgets. Passes repeat
/// until one migrates nothing or `max_swap_passes` is reached.
///
/// Returns the number of migrations.
pub fn trajectory_swap(solution: &mut Solution, params: &SolverParams) -> usize {
    let problem = solution.problem().clone();
    let matrix = solution.matrix().clone();
    let mut migrations = 0;

    for pass in 0..params.max_swap_passes {
        let assigned: Vec<WaypointIdx> = solution
            .routes()
            .iter()
            .flat_map(|route| route.targets(&problem).collect::<Vec<_>>())
            .collect();

        let mut pass_migrations = 0;

        for target in assigned {
            let Some(from_vehicle) = solution.vehicle_of(target) else {
                continue;
            };
            let from_route = solution.route(from_vehicle);
            let Some(position) = from_route
                .position(target)
                .filter(|&position| position > 0 && position + 1 < from_route.len())
            else {
                continue;
            };

            let previous = from_route.waypoints()[position - 1];
            let next = from_route.waypoints()[position + 1];
            let Some(bypass) = matrix.leg(previous.get(), next.get()) else {
                continue;
            };

            let coordinate = problem.coordinate(target);
            let ssd = distance_to_polyline(coordinate, bypass.polyline());

            let mut best: Option<Migration> = None;

            for to_vehicle in problem.vehicle_indices() {
                if to_vehicle == from_vehicle
                    || !is_accessible(&problem, params, to_vehicle, target)
                {
                    continue;
                }

                let to_route = solution.route(to_vehicle);
                let Some((segment, osd)) = nearest_segment(coordinate, to_route.trajectory())
                else {
                    continue;
                };

                if ssd - osd <= params.swap_min_gain
                    || best.as_ref().is_some_and(|best| osd >= best.osd)
                {
                    continue;
                }

                let insert_at = to_route.leg_of_segment(segment) + 1;
                let Some(candidate) = to_route.inserted(&problem, &matrix, insert_at, target, None)
                else {
                    continue;
                };

                if fits_budget(candidate.distance(), problem.vehicle(to_vehicle).fuel_budget())
                    && respects_order(&problem, candidate.waypoints())
                {
                    best = Some(Migration {
                        to_vehicle,
                        to_route: candidate,
                        osd,
                    });
                }
            }

            let Some(migration) = best else {
                continue;
            };

            let Some(mut shortened) = from_route.removed(&problem, &matrix, position) else {
                continue;
            };
            if !fits_budget(shortened.distance(), problem.vehicle(from_vehicle).fuel_budget()) {
                continue;
            }
            if shortened.is_empty() {
                shortened.set_origin(RouteOrigin::Idle);
            }

            debug!(
                target = problem.waypoint_id(target),
                from = problem.vehicle(from_vehicle).id(),
                to = problem.vehicle(migration.to_vehicle).id(),
                ssd,
                osd = migration.osd,
                "Migrating target"
            );

            solution.log_mut().push(OptimizationEvent::Migration {
                target: problem.waypoint_id(target).to_owned(),
                from_vehicle: problem.vehicle(from_vehicle).id().to_owned(),
                to_vehicle: problem.vehicle(migration.to_vehicle).id().to_owned(),
                ssd,
                osd: migration.osd,
                savings: ssd - migration.osd,
            });

            solution.set_route(shortened);
            solution.set_route(migration.to_route);
            pass_migrations += 1;
        }

        migrations += pass_migrations;

        if pass_migrations == 0 {
            return migrations;
        }

        if pass + 1 == params.max_swap_passes {
            warn!(
                passes = params.max_swap_passes,
                "Trajectory swap stopped before reaching a fixpoint"
            );
        }
    }

    migrations
}

#[cfg(test)]
mod tests {
    use geo::coord;

    use super::*;
    use crate::{
        problem::environment::{Base, Environment, Target},
        test_utils::{create_test_problem, create_test_vehicle},
    };

    fn corridor_environment() -> Environment {
        Environment {
            bases: vec![
                Base {
                    id: "A1".to_owned(),
                    coordinate: coord! { x: 0.0, y: 0.0 },
                },
                Base {
                    id: "A2".to_owned(),
                    coordinate: coord! { x: 0.0, y: 30.0 },
                },
            ],
            targets: vec![
                Target {
                    id: "T1".to_owned(),
                    coordinate: coord! { x: 50.0, y: 0.0 },
                    priority: None,
                    target_type: None,
                },
                Target {
                    id: "T2".to_owned(),
                    coordinate: coord! { x: 50.0, y: 27.0 },
                    priority: None,
                    target_type: None,
                },
                Target {
                    id: "T3".to_owned(),
                    coordinate: coord! { x: 100.0, y: 30.0 },
                    priority: None,
                    target_type: None,
                },
            ],
            threat_zones: vec![],
        }
    }

    #[test]
    fn test_target_migrates_to_closer_trajectory() {
        // D2 cannot also take T1
        let (problem, matrix) = create_test_problem(
            corridor_environment(),
            vec![
                create_test_vehicle("D1", "A1", 300.0),
                create_test_vehicle("D2", "A2", 210.0),
            ],
        );
        let mut solution = Solution::from_routes(
            problem,
            matrix,
            vec![
                ("D1", vec!["A1", "T1", "T2", "A1"]),
                ("D2", vec!["A2", "T3", "A2"]),
            ],
        )
        .unwrap();

        let migrations = trajectory_swap(&mut solution, &SolverParams::default());

        assert_eq!(migrations, 1);
        assert_eq!(solution.route_ids("D1").unwrap(), vec!["A1", "T1", "A1"]);
        assert_eq!(solution.route_ids("D2").unwrap(), vec!["A2", "T2", "T3", "A2"]);
        assert!(matches!(
            solution.log().events()[0],
            OptimizationEvent::Migration { ref target, .. } if target == "T2"
        ));
    }

    #[test]
    fn test_no_migration_below_min_gain() {
        let (problem, matrix) = create_test_problem(
            corridor_environment(),
            vec![
                create_test_vehicle("D1", "A1", 300.0),
                create_test_vehicle("D2", "A2", 300.0),
            ],
        );
        let mut solution = Solution::from_routes(
            problem,
            matrix,
            vec![
                ("D1", vec!["A1", "T1", "T2", "A1"]),
                ("D2", vec!["A2", "T3", "A2"]),
            ],
        )
        .unwrap();

        let params = SolverParams {
            swap_min_gain: 1000.0,
            ..SolverParams::default()
        };

        assert_eq!(trajectory_swap(&mut solution, &params), 0);
        assert!(solution.log().is_empty());
    }

    #[test]
    fn test_no_migration_over_budget() {
        let (problem, matrix) = create_test_problem(
            corridor_environment(),
            vec![
                create_test_vehicle("D1", "A1", 140.0),
                create_test_vehicle("D2", "A2", 200.1),
            ],
        );
        let mut solution = Solution::from_routes(
            problem,
            matrix,
            vec![
                ("D1", vec!["A1", "T1", "T2", "A1"]),
                ("D2", vec!["A2", "T3", "A2"]),
            ],
        )
        .unwrap();

        assert_eq!(trajectory_swap(&mut solution, &SolverParams::default()), 0);
    }
}
