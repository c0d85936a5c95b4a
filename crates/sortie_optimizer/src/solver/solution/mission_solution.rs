use std::sync::Arc;

use fxhash::FxHashSet;
use sortie_matrix::DistanceMatrix;

use crate::{
    problem::{MissionProblem, vehicle::VehicleIdx, waypoint::WaypointIdx},
    solver::{
        allocator::Allocation,
        error::SolveError,
        solution::{
            optimization_log::OptimizationLog,
            route::{Route, RouteOrigin, RouteSummary, fits_budget, respects_order},
        },
    },
};

/// One route per vehicle of the problem, in the problem's vehicle order.
#[derive(Debug, Clone)]
pub struct Solution {
    problem: Arc<MissionProblem>,
    matrix: Arc<DistanceMatrix>,
    routes: Vec<Route>,
    allocation: Allocation,
    log: OptimizationLog,
}

impl Solution {
    pub(crate) fn new(
        problem: Arc<MissionProblem>,
        matrix: Arc<DistanceMatrix>,
        routes: Vec<Route>,
        allocation: Allocation,
    ) -> Self {
        debug_assert_eq!(routes.len(), problem.vehicles().len());

        Solution {
            problem,
            matrix,
            routes,
            allocation,
            log: OptimizationLog::default(),
        }
    }

    /// Rebuilds a solution from waypoint id sequences keyed by vehicle id.
    /// Vehicles without a sequence get their minimal route.
    pub fn from_routes<I, S>(
        problem: Arc<MissionProblem>,
        matrix: Arc<DistanceMatrix>,
        routes: I,
    ) -> Result<Solution, SolveError>
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: AsRef<str>,
    {
        let mut resolved: Vec<Option<Route>> = vec![None; problem.vehicles().len()];
        let mut claimed: FxHashSet<WaypointIdx> = FxHashSet::default();

        for (vehicle_id, waypoint_ids) in routes {
            let vehicle_id = vehicle_id.as_ref();
            let vehicle = problem
                .vehicle_index(vehicle_id)
                .ok_or_else(|| SolveError::UnknownVehicle(vehicle_id.to_owned()))?;

            let invalid = |reason: String| SolveError::InvalidRoute {
                vehicle: vehicle_id.to_owned(),
                reason,
            };

            if resolved[vehicle.get()].is_some() {
                return Err(invalid("vehicle has more than one route".to_owned()));
            }

            let waypoints = waypoint_ids
                .iter()
                .map(|id| {
                    problem
                        .waypoint_index(id.as_ref())
                        .ok_or_else(|| invalid(format!("unknown waypoint {}", id.as_ref())))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let route = validate_route(&problem, &matrix, vehicle, waypoints).map_err(invalid)?;
            for target in route.targets(&problem) {
                if !claimed.insert(target) {
                    return Err(invalid(format!(
                        "target {} is already visited by another vehicle",
                        problem.waypoint_id(target)
                    )));
                }
            }
            resolved[vehicle.get()] = Some(route);
        }

        let routes = problem
            .vehicle_indices()
            .zip(resolved)
            .map(|(vehicle, route)| route.unwrap_or_else(|| Route::minimal(&problem, &matrix, vehicle)))
            .collect();

        let vehicles = problem.vehicles().len();
        Ok(Solution::new(problem, matrix, routes, Allocation::empty(vehicles)))
    }

    pub fn problem(&self) -> &Arc<MissionProblem> {
        &self.problem
    }

    pub fn matrix(&self) -> &Arc<DistanceMatrix> {
        &self.matrix
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, vehicle: VehicleIdx) -> &Route {
        &self.routes[vehicle]
    }

    pub fn route_by_id(&self, vehicle_id: &str) -> Option<&Route> {
        self.problem
            .vehicle_index(vehicle_id)
            .map(|vehicle| &self.routes[vehicle])
    }

    /// Waypoint ids of the route of `vehicle_id`.
    pub fn route_ids(&self, vehicle_id: &str) -> Option<Vec<&str>> {
        self.route_by_id(vehicle_id).map(|route| {
            route
                .waypoints()
                .iter()
                .map(|&waypoint| self.problem.waypoint_id(waypoint))
                .collect()
        })
    }

    pub(crate) fn set_route(&mut self, route: Route) {
        let vehicle = route.vehicle();
        self.routes[vehicle] = route;
    }

    pub fn summary(&self, vehicle: VehicleIdx) -> RouteSummary {
        self.routes[vehicle].summary(&self.problem)
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    pub(crate) fn set_allocation(&mut self, allocation: Allocation) {
        self.allocation = allocation;
    }

    pub fn log(&self) -> &OptimizationLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut OptimizationLog {
        &mut self.log
    }

    pub fn total_distance(&self) -> f64 {
        self.routes.iter().map(Route::distance).sum()
    }

    pub fn total_score(&self) -> u64 {
        self.routes.iter().map(Route::score).sum()
    }

    pub fn visited_targets(&self) -> FxHashSet<WaypointIdx> {
        self.routes
            .iter()
            .flat_map(|route| route.targets(&self.problem))
            .collect()
    }

    /// Targets of the problem visited by no route, sorted by id.
    pub fn unvisited_targets(&self) -> Vec<WaypointIdx> {
        let visited = self.visited_targets();
        self.problem
            .targets()
            .iter()
            .copied()
            .filter(|target| !visited.contains(target))
            .collect()
    }

    pub fn is_visited(&self, target: WaypointIdx) -> bool {
        self.routes.iter().any(|route| route.contains(target))
    }

    /// Vehicle currently visiting `target`.
    pub fn vehicle_of(&self, target: WaypointIdx) -> Option<VehicleIdx> {
        self.routes
            .iter()
            .find(|route| route.contains(target))
            .map(Route::vehicle)
    }
}

fn validate_route(
    problem: &MissionProblem,
    matrix: &DistanceMatrix,
    vehicle: VehicleIdx,
    waypoints: Vec<WaypointIdx>,
) -> Result<Route, String> {
    let config = problem.vehicle(vehicle);

    let (&first, &last) = match (waypoints.first(), waypoints.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err("route is empty".to_owned()),
    };

    if first != config.start() {
        return Err(format!(
            "route starts at {} instead of {}",
            problem.waypoint_id(first),
            problem.waypoint_id(config.start())
        ));
    }

    if !config.is_enabled() && waypoints.len() > 1 {
        return Err("vehicle is disabled".to_owned());
    }

    if waypoints.len() > 1 && !problem.is_allowed_end(vehicle, last) {
        return Err(format!("route cannot end at {}", problem.waypoint_id(last)));
    }

    if !respects_order(problem, &waypoints) {
        return Err("target visited after the final anchor".to_owned());
    }

    let mut seen = FxHashSet::default();
    for &waypoint in &waypoints {
        if problem.waypoint(waypoint).is_target() && !seen.insert(waypoint) {
            return Err(format!("target {} visited twice", problem.waypoint_id(waypoint)));
        }
    }

    let origin = if config.is_enabled() {
        RouteOrigin::Provided
    } else {
        RouteOrigin::Disabled
    };
    let route = Route::new(problem, matrix, vehicle, waypoints, origin)
        .ok_or_else(|| "route contains an unreachable leg".to_owned())?;

    if !fits_budget(route.distance(), config.fuel_budget()) {
        return Err(format!(
            "distance {:.3} exceeds the fuel budget {:.3}",
            route.distance(),
            config.fuel_budget()
        ));
    }

    Ok(route)
}
