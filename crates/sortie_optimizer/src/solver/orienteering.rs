pub mod exact;
pub mod heuristic;

use std::cmp::Ordering;

use fxhash::FxHashSet;
use jiff::Timestamp;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use smallvec::SmallVec;
use sortie_matrix::DistanceMatrix;
use tracing::{debug, instrument, warn};

use crate::{
    problem::{MissionProblem, vehicle::VehicleIdx, waypoint::WaypointIdx},
    solver::{
        allocator::{Allocation, AllocationMode, is_reachable},
        error::SolveError,
        solution::route::{Route, RouteOrigin, fits_budget},
        solver_params::SolverParams,
    },
};

use exact::{MAX_EXACT_TARGETS, TIE_EPSILON, solve_exact};
use heuristic::solve_heuristic;

/// Everything one vehicle's search needs. `ends` only holds the ends reachable
/// straight from the start.
pub struct TourInput<'a> {
    pub problem: &'a MissionProblem,
    pub matrix: &'a DistanceMatrix,
    pub vehicle: VehicleIdx,
    pub start: WaypointIdx,
    pub ends: SmallVec<[WaypointIdx; 4]>,
    pub budget: f64,

    /// Sorted by id
    pub candidates: Vec<WaypointIdx>,
    pub priorities: Vec<u32>,
}

impl<'a> TourInput<'a> {
    pub fn new(
        problem: &'a MissionProblem,
        matrix: &'a DistanceMatrix,
        vehicle: VehicleIdx,
        candidates: &[WaypointIdx],
    ) -> Self {
        let config = problem.vehicle(vehicle);
        let start = config.start();
        let budget = config.fuel_budget();

        // Ring detours are not strictly metric, so an end dropped here may still
        // be reachable through a target. Those vehicles end up on `Route::minimal`
        // or stay stranded.
        let ends = problem
            .end_candidates(vehicle)
            .into_iter()
            .filter(|end| fits_budget(matrix.distance(start.get(), end.get()), budget))
            .collect();

        let mut candidates = candidates.to_vec();
        candidates.sort_by(|&a, &b| problem.waypoint_id(a).cmp(problem.waypoint_id(b)));
        candidates.dedup();

        let priorities = candidates
            .iter()
            .map(|&candidate| problem.waypoint(candidate).priority())
            .collect();

        TourInput {
            problem,
            matrix,
            vehicle,
            start,
            ends,
            budget,
            candidates,
            priorities,
        }
    }

    pub fn min_end_distance(&self, from: WaypointIdx) -> f64 {
        self.ends
            .iter()
            .map(|end| self.matrix.distance(from.get(), end.get()))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Selected targets in visiting order, closed by `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tour {
    pub targets: Vec<WaypointIdx>,
    pub end: WaypointIdx,
    pub distance: f64,
    pub score: u64,
}

/// `Less` when `a` is the better tour: higher score, then shorter, then the
/// smaller target id sequence, then the first end.
pub fn compare_tours(input: &TourInput, a: &Tour, b: &Tour) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| {
            if (a.distance - b.distance).abs() <= TIE_EPSILON {
                Ordering::Equal
            } else {
                a.distance.total_cmp(&b.distance)
            }
        })
        .then_with(|| {
            let ids = |tour: &Tour| {
                tour.targets
                    .iter()
                    .map(|&target| input.problem.waypoint_id(target))
                    .collect::<Vec<_>>()
            };
            ids(a).cmp(&ids(b))
        })
        .then_with(|| {
            let position = |end: WaypointIdx| input.ends.iter().position(|&e| e == end);
            position(a.end).cmp(&position(b.end))
        })
}

/// Best route for one vehicle over `candidates`.
pub fn solve_vehicle(
    problem: &MissionProblem,
    matrix: &DistanceMatrix,
    params: &SolverParams,
    vehicle: VehicleIdx,
    candidates: &[WaypointIdx],
) -> Route {
    let config = problem.vehicle(vehicle);
    if !config.is_enabled() {
        return Route::stationary(problem, vehicle, RouteOrigin::Disabled);
    }

    let reachable = candidates
        .iter()
        .copied()
        .filter(|&target| is_reachable(problem, matrix, vehicle, target))
        .collect::<Vec<_>>();
    let input = TourInput::new(problem, matrix, vehicle, &reachable);

    if input.ends.is_empty() {
        warn!(
            vehicle = config.id(),
            budget = config.fuel_budget(),
            "No end reachable within the fuel budget"
        );
        return Route::stationary(problem, vehicle, RouteOrigin::Stranded);
    }

    let exact_limit = params.max_exact_targets.min(MAX_EXACT_TARGETS);
    let (tour, origin) = if input.candidates.len() <= exact_limit {
        let deadline = Timestamp::now() + params.exact_time_limit;

        match solve_exact(&input, deadline) {
            Some(tour) => (Some(tour), RouteOrigin::Exact),
            None => {
                warn!(
                    vehicle = config.id(),
                    candidates = input.candidates.len(),
                    "Exact search timed out, falling back to the heuristic"
                );
                (
                    solve_heuristic(&input, params.heuristic_max_iterations),
                    RouteOrigin::Heuristic,
                )
            }
        }
    } else {
        (
            solve_heuristic(&input, params.heuristic_max_iterations),
            RouteOrigin::Heuristic,
        )
    };

    let route = tour
        .filter(|tour| !tour.targets.is_empty())
        .and_then(|tour| {
            let mut waypoints = Vec::with_capacity(tour.targets.len() + 2);
            waypoints.push(input.start);
            waypoints.extend_from_slice(&tour.targets);
            waypoints.push(tour.end);

            Route::new(problem, matrix, vehicle, waypoints, origin)
        })
        .unwrap_or_else(|| Route::minimal(problem, matrix, vehicle));

    debug!(
        vehicle = config.id(),
        candidates = input.candidates.len(),
        targets = route.target_count(),
        score = route.score(),
        distance = route.distance(),
        origin = ?route.origin(),
        "Solved vehicle"
    );

    route
}

/// Routes every vehicle of the problem, indexed like `problem.vehicles()`.
///
/// With overlapping candidates, vehicles are solved one after another in id
/// order and each claims the targets it visits. Disjoint candidates are
/// independent and solved in parallel.
#[instrument(skip_all, level = "debug")]
pub fn route_vehicles(
    problem: &MissionProblem,
    matrix: &DistanceMatrix,
    params: &SolverParams,
    allocation: &Allocation,
) -> Result<Vec<Route>, SolveError> {
    match params.allocation_mode {
        AllocationMode::Overlapping => {
            let mut claimed: FxHashSet<WaypointIdx> = FxHashSet::default();
            let mut routes: Vec<Option<Route>> = vec![None; problem.vehicles().len()];

            for vehicle in problem.vehicles_by_id() {
                let candidates = allocation
                    .candidates(vehicle)
                    .iter()
                    .copied()
                    .filter(|target| !claimed.contains(target))
                    .collect::<Vec<_>>();

                let route = solve_vehicle(problem, matrix, params, vehicle, &candidates);
                claimed.extend(route.targets(problem));
                routes[vehicle.get()] = Some(route);
            }

            Ok(routes.into_iter().flatten().collect())
        }
        AllocationMode::Disjoint => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(params.solver_threads.number_of_threads())
                .build()?;

            Ok(pool.install(|| {
                problem
                    .vehicle_indices()
                    .collect::<Vec<_>>()
                    .into_par_iter()
                    .map(|vehicle| {
                        solve_vehicle(
                            problem,
                            matrix,
                            params,
                            vehicle,
                            allocation.candidates(vehicle),
                        )
                    })
                    .collect()
            }))
        }
    }
}
