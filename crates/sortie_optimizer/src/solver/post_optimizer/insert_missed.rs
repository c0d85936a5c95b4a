use fxhash::FxHashSet;
use tracing::debug;

use crate::{
    problem::{MissionProblem, waypoint::WaypointIdx},
    solver::{
        allocator::is_accessible,
        error::SolveError,
        insertion::{TargetInsertion, apply_insertion, best_insertion},
        solution::{Solution, optimization_log::OptimizationEvent, route::respects_order},
        solver_params::SolverParams,
    },
};

/// Targets some vehicle may visit but no route does, highest priority first.
/// Targets strictly inside a zone are never part of it.
pub fn missed_targets(solution: &Solution, params: &SolverParams) -> Vec<WaypointIdx> {
    let problem = solution.problem();
    let visited = solution.visited_targets();

    let mut missed = problem
        .targets()
        .iter()
        .copied()
        .filter(|target| !visited.contains(target))
        .filter(|&target| !problem.is_inside_zone(target))
        .filter(|&target| {
            problem
                .vehicle_indices()
                .any(|vehicle| is_accessible(problem, params, vehicle, target))
        })
        .collect::<Vec<_>>();

    missed.sort_by(|&a, &b| {
        problem
            .waypoint(b)
            .priority()
            .cmp(&problem.waypoint(a).priority())
            .then_with(|| problem.waypoint_id(a).cmp(problem.waypoint_id(b)))
    });

    missed
}

/// Splices every missed target into the route where it costs the least fuel.
///
/// Existing visits are never removed or reordered. The visited set is checked
/// afterwards and any lost target is reported as an error.
///
/// Returns the number of insertions.
pub fn insert_missed(solution: &mut Solution, params: &SolverParams) -> Result<usize, SolveError> {
    let problem = solution.problem().clone();
    let matrix = solution.matrix().clone();
    let visited_before = solution.visited_targets();
    let mut insertions = 0;

    for target in missed_targets(solution, params) {
        let mut best: Option<TargetInsertion> = None;

        for vehicle in problem.vehicle_indices() {
            if !is_accessible(&problem, params, vehicle, target) {
                continue;
            }

            let route = solution.route(vehicle);
            let budget = problem.vehicle(vehicle).fuel_budget();

            let Some(insertion) = best_insertion(&problem, &matrix, route, target, budget) else {
                continue;
            };

            if best.as_ref().is_none_or(|best| insertion.delta < best.delta) {
                best = Some(insertion);
            }
        }

        let Some(insertion) = best else {
            continue;
        };

        let route = solution.route(insertion.vehicle);
        let Some(updated) = apply_insertion(&problem, &matrix, route, &insertion)
            .filter(|updated| respects_order(&problem, updated.waypoints()))
        else {
            continue;
        };

        debug!(
            target = problem.waypoint_id(target),
            vehicle = problem.vehicle(insertion.vehicle).id(),
            position = insertion.position,
            marginal_cost = insertion.delta,
            "Inserted missed target"
        );

        solution.log_mut().push(OptimizationEvent::Insertion {
            target: problem.waypoint_id(target).to_owned(),
            vehicle: problem.vehicle(insertion.vehicle).id().to_owned(),
            position: insertion.position,
            marginal_cost: insertion.delta,
        });
        solution.set_route(updated);
        insertions += 1;
    }

    ensure_still_visited(&problem, &visited_before, &solution.visited_targets())?;

    Ok(insertions)
}

/// Fails with the sorted ids of the targets of `before` missing from `after`.
pub(crate) fn ensure_still_visited(
    problem: &MissionProblem,
    before: &FxHashSet<WaypointIdx>,
    after: &FxHashSet<WaypointIdx>,
) -> Result<(), SolveError> {
    let mut missing = before
        .difference(after)
        .map(|&target| problem.waypoint_id(target).to_owned())
        .collect::<Vec<_>>();

    if missing.is_empty() {
        return Ok(());
    }

    missing.sort();
    Err(SolveError::LostTargets { missing })
}

#[cfg(test)]
mod tests {
    use geo::coord;
    use sortie_matrix::ThreatZone;

    use super::*;
    use crate::{
        problem::vehicle::VehicleIdx,
        test_utils::{create_test_environment, create_test_problem, create_test_vehicle},
    };

    #[test]
    fn test_inserts_missed_targets_by_priority() {
        let (problem, matrix) = create_test_problem(
            create_test_environment(),
            vec![
                create_test_vehicle("D1", "A1", 100.0),
                create_test_vehicle("D2", "A2", 100.0),
            ],
        );
        let mut solution =
            Solution::from_routes(problem, matrix, vec![("D1", vec!["A1", "T1", "A1"])]).unwrap();

        assert_eq!(solution.route_ids("D2").unwrap(), vec!["A2"]);

        let inserted = insert_missed(&mut solution, &SolverParams::default()).unwrap();

        // T3 goes first and only fits D2, T2 then only fits D1
        assert_eq!(inserted, 2);
        assert_eq!(solution.route_ids("D1").unwrap(), vec!["A1", "T2", "T1", "A1"]);
        assert_eq!(solution.route_ids("D2").unwrap(), vec!["A2", "T3", "A2"]);
        assert_eq!(solution.log().insertions().count(), 2);
    }

    #[test]
    fn test_never_inserts_targets_inside_zones() {
        let mut environment = create_test_environment();
        environment
            .threat_zones
            .push(ThreatZone::new(coord! { x: 60.0, y: -12.0 }, 5.0));

        let (problem, matrix) =
            create_test_problem(environment, vec![create_test_vehicle("D1", "A1", 500.0)]);
        let mut solution =
            Solution::from_routes(problem.clone(), matrix, vec![("D1", vec!["A1"])]).unwrap();

        insert_missed(&mut solution, &SolverParams::default()).unwrap();

        let t3 = problem.waypoint_index("T3").unwrap();
        assert!(!solution.is_visited(t3));
        assert_eq!(solution.route(VehicleIdx::new(0)).target_count(), 2);
    }

    #[test]
    fn test_lost_targets_are_reported() {
        let (problem, _) = create_test_problem(
            create_test_environment(),
            vec![create_test_vehicle("D1", "A1", 500.0)],
        );
        let index = |id: &str| problem.waypoint_index(id).unwrap();

        let before = [index("T1"), index("T2"), index("T3")]
            .into_iter()
            .collect::<FxHashSet<_>>();
        let kept = [index("T1"), index("T2"), index("T3")]
            .into_iter()
            .collect::<FxHashSet<_>>();
        let dropped = [index("T2")].into_iter().collect::<FxHashSet<_>>();

        assert!(ensure_still_visited(&problem, &before, &kept).is_ok());
        match ensure_still_visited(&problem, &before, &dropped) {
            Err(SolveError::LostTargets { missing }) => assert_eq!(missing, vec!["T1", "T3"]),
            other => panic!("expected lost targets, got {other:?}"),
        }
    }
}
