use geo::Coord;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sortie_matrix::DistanceMatrix;

use crate::problem::{MissionProblem, vehicle::VehicleIdx, waypoint::WaypointIdx};

/// Tolerance when comparing a route distance against a fuel budget.
pub const FUEL_EPSILON: f64 = 1e-9;

#[inline(always)]
pub fn fits_budget(distance: f64, budget: f64) -> bool {
    distance <= budget + FUEL_EPSILON
}

/// How the route was produced.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteOrigin {
    Exact,
    Heuristic,
    /// No target is feasible, the vehicle only flies to its end.
    Idle,
    /// Not even the end is reachable within the budget, the vehicle stays put.
    Stranded,
    Disabled,
    /// Rebuilt from an explicit waypoint sequence.
    Provided,
}

/// True if no target comes after the last anchor of the sequence.
pub fn respects_order(problem: &MissionProblem, waypoints: &[WaypointIdx]) -> bool {
    match waypoints
        .iter()
        .rposition(|&waypoint| problem.waypoint(waypoint).is_anchor())
    {
        Some(last_anchor) => waypoints[last_anchor + 1..]
            .iter()
            .all(|&waypoint| problem.waypoint(waypoint).is_anchor()),
        None => waypoints.is_empty(),
    }
}

/// Figures reported for a route.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq)]
pub struct RouteSummary {
    pub distance: f64,
    pub score: u64,
    pub budget: f64,
    pub remaining_fuel: f64,
    pub origin: RouteOrigin,

    /// The route finishes on one of the allowed ends of its vehicle.
    pub reaches_end: bool,
}

/// Ordered waypoints of one vehicle with the trajectory realizing them.
#[derive(Debug, Clone)]
pub struct Route {
    vehicle: VehicleIdx,
    waypoints: Vec<WaypointIdx>,
    trajectory: Vec<Coord>,

    /// Index in `trajectory` of the first vertex of each leg.
    leg_offsets: Vec<usize>,

    distance: f64,
    score: u64,
    target_count: usize,
    origin: RouteOrigin,
}

impl Route {
    /// Builds the route and its trajectory, `None` if a leg is unreachable.
    pub fn new(
        problem: &MissionProblem,
        matrix: &DistanceMatrix,
        vehicle: VehicleIdx,
        waypoints: Vec<WaypointIdx>,
        origin: RouteOrigin,
    ) -> Option<Route> {
        let first = *waypoints.first()?;

        let mut trajectory = Vec::with_capacity(waypoints.len() * 2);
        let mut leg_offsets = Vec::with_capacity(waypoints.len().saturating_sub(1));
        let mut distance = 0.0;

        trajectory.push(problem.coordinate(first));

        for window in waypoints.windows(2) {
            let leg = matrix.leg(window[0].get(), window[1].get())?;

            leg_offsets.push(trajectory.len() - 1);
            distance += leg.distance();

            match leg.polyline() {
                [single] => trajectory.push(*single),
                polyline => trajectory.extend_from_slice(&polyline[1..]),
            }
        }

        let score = waypoints
            .iter()
            .map(|&waypoint| problem.waypoint(waypoint).priority() as u64)
            .sum();
        let target_count = waypoints
            .iter()
            .filter(|&&waypoint| problem.waypoint(waypoint).is_target())
            .count();

        Some(Route {
            vehicle,
            waypoints,
            trajectory,
            leg_offsets,
            distance,
            score,
            target_count,
            origin,
        })
    }

    /// Route that never leaves the start of the vehicle.
    pub fn stationary(problem: &MissionProblem, vehicle: VehicleIdx, origin: RouteOrigin) -> Route {
        let start = problem.vehicle(vehicle).start();

        Route {
            vehicle,
            waypoints: vec![start],
            trajectory: vec![problem.coordinate(start)],
            leg_offsets: vec![],
            distance: 0.0,
            score: 0,
            target_count: 0,
            origin,
        }
    }

    /// Shortest feasible route without targets: `[S]` when the start is a
    /// valid end, otherwise `[S, E]` with the closest reachable end.
    pub fn minimal(problem: &MissionProblem, matrix: &DistanceMatrix, vehicle: VehicleIdx) -> Route {
        let config = problem.vehicle(vehicle);
        let start = config.start();

        if !config.is_enabled() {
            return Route::stationary(problem, vehicle, RouteOrigin::Disabled);
        }

        if problem.is_allowed_end(vehicle, start) {
            return Route::stationary(problem, vehicle, RouteOrigin::Idle);
        }

        let mut best: Option<(WaypointIdx, f64)> = None;
        for end in problem.end_candidates(vehicle) {
            let distance = matrix.distance(start.get(), end.get());
            if fits_budget(distance, config.fuel_budget())
                && best.is_none_or(|(_, best_distance)| distance < best_distance)
            {
                best = Some((end, distance));
            }
        }

        best.and_then(|(end, _)| {
            Route::new(problem, matrix, vehicle, vec![start, end], RouteOrigin::Idle)
        })
        .unwrap_or_else(|| Route::stationary(problem, vehicle, RouteOrigin::Stranded))
    }

    /// Same vehicle and origin with another waypoint sequence.
    pub fn with_waypoints(
        &self,
        problem: &MissionProblem,
        matrix: &DistanceMatrix,
        waypoints: Vec<WaypointIdx>,
    ) -> Option<Route> {
        Route::new(problem, matrix, self.vehicle, waypoints, self.origin)
    }

    /// Route with `target` inserted at `position`. When the route has not
    /// left its start yet, `end` closes it.
    pub fn inserted(
        &self,
        problem: &MissionProblem,
        matrix: &DistanceMatrix,
        position: usize,
        target: WaypointIdx,
        end: Option<WaypointIdx>,
    ) -> Option<Route> {
        let mut waypoints = Vec::with_capacity(self.waypoints.len() + 2);

        match (self.waypoints.as_slice(), end) {
            ([start], Some(end)) => waypoints.extend([*start, target, end]),
            _ => {
                waypoints.extend_from_slice(&self.waypoints);
                waypoints.insert(position, target);
            }
        }

        let mut route = self.with_waypoints(problem, matrix, waypoints)?;
        if matches!(route.origin, RouteOrigin::Idle) {
            route.origin = RouteOrigin::Heuristic;
        }
        Some(route)
    }

    /// Route without the waypoint at `position`. A route left as `[S, S]`
    /// collapses to `[S]`.
    pub fn removed(
        &self,
        problem: &MissionProblem,
        matrix: &DistanceMatrix,
        position: usize,
    ) -> Option<Route> {
        let mut waypoints = self.waypoints.clone();
        waypoints.remove(position);

        if matches!(waypoints.as_slice(), [start, end] if start == end) {
            waypoints.truncate(1);
        }

        self.with_waypoints(problem, matrix, waypoints)
    }

    pub fn vehicle(&self) -> VehicleIdx {
        self.vehicle
    }

    pub fn waypoints(&self) -> &[WaypointIdx] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// True if the route visits no target.
    pub fn is_empty(&self) -> bool {
        self.target_count == 0
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Targets in visiting order.
    pub fn targets<'a>(
        &'a self,
        problem: &'a MissionProblem,
    ) -> impl Iterator<Item = WaypointIdx> + 'a {
        self.waypoints
            .iter()
            .copied()
            .filter(move |&waypoint| problem.waypoint(waypoint).is_target())
    }

    pub fn contains(&self, waypoint: WaypointIdx) -> bool {
        self.waypoints.contains(&waypoint)
    }

    pub fn position(&self, waypoint: WaypointIdx) -> Option<usize> {
        self.waypoints.iter().position(|&current| current == waypoint)
    }

    pub fn first(&self) -> WaypointIdx {
        self.waypoints[0]
    }

    pub fn last(&self) -> WaypointIdx {
        self.waypoints[self.waypoints.len() - 1]
    }

    pub fn trajectory(&self) -> &[Coord] {
        &self.trajectory
    }

    pub fn leg_count(&self) -> usize {
        self.leg_offsets.len()
    }

    /// Vertices of leg `leg`, from `waypoints[leg]` to `waypoints[leg + 1]`.
    pub fn leg_trajectory(&self, leg: usize) -> &[Coord] {
        let start = self.leg_offsets[leg];
        let end = self
            .leg_offsets
            .get(leg + 1)
            .copied()
            .unwrap_or(self.trajectory.len() - 1);

        &self.trajectory[start..=end]
    }

    /// Leg containing the trajectory segment `[segment, segment + 1]`.
    pub fn leg_of_segment(&self, segment: usize) -> usize {
        self.leg_offsets
            .partition_point(|&offset| offset <= segment)
            .saturating_sub(1)
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn origin(&self) -> RouteOrigin {
        self.origin
    }

    pub fn summary(&self, problem: &MissionProblem) -> RouteSummary {
        let budget = problem.vehicle(self.vehicle).fuel_budget();

        RouteSummary {
            distance: self.distance,
            score: self.score,
            budget,
            remaining_fuel: (budget - self.distance).max(0.0),
            origin: self.origin,
            reaches_end: problem.is_allowed_end(self.vehicle, self.last()),
        }
    }

    pub(crate) fn set_origin(&mut self, origin: RouteOrigin) {
        self.origin = origin;
    }
}
