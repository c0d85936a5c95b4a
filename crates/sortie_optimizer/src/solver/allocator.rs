use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sortie_matrix::DistanceMatrix;
use tracing::{debug, instrument};

use crate::{
    problem::{MissionProblem, vehicle::VehicleIdx, waypoint::WaypointIdx},
    solver::{solution::route::fits_budget, solver_params::SolverParams},
};

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Every vehicle receives all the targets it can reach.
    #[default]
    Overlapping,
    /// Every target goes to a single vehicle.
    Disjoint,
}

/// Candidate targets per vehicle, plus the targets no vehicle can take.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    pub candidates: Vec<Vec<WaypointIdx>>,

    /// No vehicle is allowed to visit them.
    pub orphaned: Vec<WaypointIdx>,

    /// Allowed for some vehicle, but out of every allowed vehicle's fuel range.
    pub unreachable: Vec<WaypointIdx>,

    /// Rejected by the mission priority filter.
    pub filtered: Vec<WaypointIdx>,

    /// Strictly inside a threat zone.
    pub inside_zones: Vec<WaypointIdx>,
}

impl Allocation {
    pub fn empty(vehicles: usize) -> Self {
        Allocation {
            candidates: vec![Vec::new(); vehicles],
            ..Allocation::default()
        }
    }

    pub fn candidates(&self, vehicle: VehicleIdx) -> &[WaypointIdx] {
        self.candidates
            .get(vehicle.get())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Static rules deciding whether `vehicle` may visit `target`.
pub fn is_accessible(
    problem: &MissionProblem,
    params: &SolverParams,
    vehicle: VehicleIdx,
    target: WaypointIdx,
) -> bool {
    let config = problem.vehicle(vehicle).config();
    let waypoint = problem.waypoint(target);

    if !config.enabled() || !waypoint.is_target() || problem.is_inside_zone(target) {
        return false;
    }

    if params
        .priority_filter
        .is_some_and(|filter| !filter.accepts(waypoint.priority()))
    {
        return false;
    }

    if params
        .pinned_targets
        .get(waypoint.id())
        .is_some_and(|pinned| pinned != config.id())
    {
        return false;
    }

    config.can_access(waypoint)
}

/// A visit `start -> target -> closest end` fits in the budget.
pub fn is_reachable(
    problem: &MissionProblem,
    matrix: &DistanceMatrix,
    vehicle: VehicleIdx,
    target: WaypointIdx,
) -> bool {
    let config = problem.vehicle(vehicle);
    let to_target = matrix.distance(config.start().get(), target.get());
    let to_end = problem
        .end_candidates(vehicle)
        .iter()
        .map(|end| matrix.distance(target.get(), end.get()))
        .fold(f64::INFINITY, f64::min);

    fits_budget(to_target + to_end, config.fuel_budget())
}

#[instrument(skip_all, level = "debug")]
pub fn allocate(
    problem: &MissionProblem,
    matrix: &DistanceMatrix,
    params: &SolverParams,
) -> Allocation {
    let mut allocation = Allocation::empty(problem.vehicles().len());
    let mut eligible: Vec<(WaypointIdx, Vec<VehicleIdx>)> = Vec::new();

    for &target in problem.targets() {
        if problem.is_inside_zone(target) {
            allocation.inside_zones.push(target);
            continue;
        }

        if params
            .priority_filter
            .is_some_and(|filter| !filter.accepts(problem.waypoint(target).priority()))
        {
            allocation.filtered.push(target);
            continue;
        }

        let accessible = problem
            .vehicle_indices()
            .filter(|&vehicle| is_accessible(problem, params, vehicle, target))
            .collect::<Vec<_>>();

        if accessible.is_empty() {
            allocation.orphaned.push(target);
            continue;
        }

        let reachable = accessible
            .into_iter()
            .filter(|&vehicle| is_reachable(problem, matrix, vehicle, target))
            .collect::<Vec<_>>();

        if reachable.is_empty() {
            allocation.unreachable.push(target);
            continue;
        }

        eligible.push((target, reachable));
    }

    match params.allocation_mode {
        AllocationMode::Overlapping => {
            for (target, vehicles) in eligible {
                for vehicle in vehicles {
                    allocation.candidates[vehicle].push(target);
                }
            }
        }
        AllocationMode::Disjoint => {
            // Highest priority first so valuable targets pick their vehicle
            eligible.sort_by(|(a, _), (b, _)| {
                problem
                    .waypoint(*b)
                    .priority()
                    .cmp(&problem.waypoint(*a).priority())
                    .then_with(|| problem.waypoint_id(*a).cmp(problem.waypoint_id(*b)))
            });

            for (target, vehicles) in eligible {
                let chosen = vehicles.into_iter().min_by(|&a, &b| {
                    let distance_a = matrix.distance(problem.vehicle(a).start().get(), target.get());
                    let distance_b = matrix.distance(problem.vehicle(b).start().get(), target.get());

                    allocation.candidates[a]
                        .len()
                        .cmp(&allocation.candidates[b].len())
                        .then_with(|| distance_a.total_cmp(&distance_b))
                        .then_with(|| problem.vehicle(a).id().cmp(problem.vehicle(b).id()))
                });

                if let Some(vehicle) = chosen {
                    allocation.candidates[vehicle].push(target);
                }
            }
        }
    }

    debug!(
        candidates = allocation.candidates.iter().map(Vec::len).sum::<usize>(),
        orphaned = allocation.orphaned.len(),
        unreachable = allocation.unreachable.len(),
        filtered = allocation.filtered.len(),
        inside_zones = allocation.inside_zones.len(),
        "Allocated targets"
    );

    allocation
}
