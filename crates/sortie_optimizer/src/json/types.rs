use std::collections::BTreeMap;

use geo::{Coord, coord};
use jiff::SignedDuration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sortie_matrix::ThreatZone;
use tracing::instrument;

use crate::{
    problem::{
        MissionProblem, ProblemError,
        environment::{Base, Environment, Target},
        vehicle::{EndPoint, PriorityFilter, StartPoint, VehicleConfig, VehicleConfigBuilder},
        waypoint::WaypointIdx,
    },
    solver::{
        allocator::AllocationMode,
        replanner::{Checkpoint, VehicleCheckpoint},
        solution::{
            Solution,
            optimization_log::OptimizationEvent,
            route::{Route, RouteSummary},
        },
        solver_params::{SolverParams, Threads},
    },
};

pub trait FromProblem<T> {
    fn from_problem(value: T, problem: &MissionProblem) -> Self;
}

fn to_coord(coordinates: [f64; 2]) -> Coord {
    coord! { x: coordinates[0], y: coordinates[1] }
}

fn from_coord(coordinate: Coord) -> [f64; 2] {
    [coordinate.x, coordinate.y]
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "MissionRequest")]
pub struct JsonMissionRequest {
    pub environment: JsonEnvironment,
    pub vehicles: Vec<JsonVehicle>,
    pub params: Option<JsonSolverParams>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "Environment")]
pub struct JsonEnvironment {
    pub bases: Vec<JsonBase>,
    pub targets: Vec<JsonTarget>,

    #[serde(default)]
    pub threat_zones: Vec<JsonThreatZone>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "Base")]
pub struct JsonBase {
    pub id: String,
    pub coordinates: [f64; 2],
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "Target")]
pub struct JsonTarget {
    pub id: String,
    pub coordinates: [f64; 2],

    /// Defaults to 1
    pub priority: Option<u32>,

    #[serde(rename = "type")]
    pub target_type: Option<String>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "ThreatZone")]
pub struct JsonThreatZone {
    pub center: [f64; 2],
    pub radius: f64,
}

impl From<JsonEnvironment> for Environment {
    fn from(value: JsonEnvironment) -> Self {
        Environment {
            bases: value
                .bases
                .into_iter()
                .map(|base| Base {
                    id: base.id,
                    coordinate: to_coord(base.coordinates),
                })
                .collect(),
            targets: value
                .targets
                .into_iter()
                .map(|target| Target {
                    id: target.id,
                    coordinate: to_coord(target.coordinates),
                    priority: target.priority,
                    target_type: target.target_type,
                })
                .collect(),
            threat_zones: value
                .threat_zones
                .into_iter()
                .map(|zone| ThreatZone::new(to_coord(zone.center), zone.radius))
                .collect(),
        }
    }
}

impl From<&Environment> for JsonEnvironment {
    fn from(value: &Environment) -> Self {
        JsonEnvironment {
            bases: value
                .bases
                .iter()
                .map(|base| JsonBase {
                    id: base.id.clone(),
                    coordinates: from_coord(base.coordinate),
                })
                .collect(),
            targets: value
                .targets
                .iter()
                .map(|target| JsonTarget {
                    id: target.id.clone(),
                    coordinates: from_coord(target.coordinate),
                    priority: target.priority,
                    target_type: target.target_type.clone(),
                })
                .collect(),
            threat_zones: value
                .threat_zones
                .iter()
                .map(|zone| JsonThreatZone {
                    center: from_coord(zone.center()),
                    radius: zone.radius(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", rename = "StartPoint")]
pub enum JsonStartPoint {
    Base(String),
    Coordinates([f64; 2]),
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", rename = "EndPoint")]
pub enum JsonEndPoint {
    Base(String),
    Coordinates([f64; 2]),
    Flexible,
    ReturnToStart,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename = "PriorityFilter")]
pub struct JsonPriorityFilter {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl From<JsonPriorityFilter> for PriorityFilter {
    fn from(value: JsonPriorityFilter) -> Self {
        PriorityFilter {
            min: value.min,
            max: value.max,
        }
    }
}

impl From<&PriorityFilter> for JsonPriorityFilter {
    fn from(value: &PriorityFilter) -> Self {
        JsonPriorityFilter {
            min: value.min,
            max: value.max,
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "Vehicle")]
pub struct JsonVehicle {
    pub id: String,
    pub enabled: Option<bool>,
    pub fuel_budget: f64,
    pub start: JsonStartPoint,

    /// Defaults to returning to the start
    pub end: Option<JsonEndPoint>,

    pub allowed_target_types: Option<Vec<String>>,
    pub excluded_targets: Option<Vec<String>>,
    pub priority_filter: Option<JsonPriorityFilter>,
}

impl From<JsonVehicle> for VehicleConfig {
    fn from(value: JsonVehicle) -> Self {
        let start = match value.start {
            JsonStartPoint::Base(base) => StartPoint::Base(base),
            JsonStartPoint::Coordinates(coordinates) => StartPoint::Coordinate(to_coord(coordinates)),
        };
        let end = match value.end {
            Some(JsonEndPoint::Base(base)) => EndPoint::Base(base),
            Some(JsonEndPoint::Coordinates(coordinates)) => EndPoint::Coordinate(to_coord(coordinates)),
            Some(JsonEndPoint::Flexible) => EndPoint::Flexible,
            Some(JsonEndPoint::ReturnToStart) | None => EndPoint::ReturnToStart,
        };

        let mut builder = VehicleConfigBuilder::new(value.id, value.fuel_budget, start, end);

        if let Some(enabled) = value.enabled {
            builder.set_enabled(enabled);
        }

        if let Some(types) = value.allowed_target_types {
            builder.set_allowed_target_types(types);
        }

        if let Some(excluded) = value.excluded_targets {
            builder.set_excluded_targets(excluded);
        }

        if let Some(filter) = value.priority_filter {
            builder.set_priority_filter(filter.into());
        }

        builder.build()
    }
}

impl From<&VehicleConfig> for JsonVehicle {
    fn from(value: &VehicleConfig) -> Self {
        let mut excluded_targets = value.excluded_targets().iter().cloned().collect::<Vec<_>>();
        excluded_targets.sort();

        JsonVehicle {
            id: value.id().to_owned(),
            enabled: Some(value.enabled()),
            fuel_budget: value.fuel_budget(),
            start: match value.start() {
                StartPoint::Base(base) => JsonStartPoint::Base(base.clone()),
                StartPoint::Coordinate(coordinate) => {
                    JsonStartPoint::Coordinates(from_coord(*coordinate))
                }
            },
            end: Some(match value.end() {
                EndPoint::Base(base) => JsonEndPoint::Base(base.clone()),
                EndPoint::Coordinate(coordinate) => JsonEndPoint::Coordinates(from_coord(*coordinate)),
                EndPoint::Flexible => JsonEndPoint::Flexible,
                EndPoint::ReturnToStart => JsonEndPoint::ReturnToStart,
            }),
            allowed_target_types: value.allowed_target_types().map(|types| {
                let mut types = types.iter().cloned().collect::<Vec<_>>();
                types.sort();
                types
            }),
            excluded_targets: Some(excluded_targets),
            priority_filter: value.priority_filter().map(JsonPriorityFilter::from),
        }
    }
}

/// Overrides of the default solver parameters.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default)]
#[serde(deny_unknown_fields, rename = "SolverParams")]
pub struct JsonSolverParams {
    pub allocation_mode: Option<AllocationMode>,
    pub priority_filter: Option<JsonPriorityFilter>,

    /// Target id to vehicle id
    pub pinned_targets: Option<BTreeMap<String, String>>,

    pub max_exact_targets: Option<usize>,
    pub exact_time_limit: Option<SignedDuration>,
    pub heuristic_max_iterations: Option<usize>,

    pub swap_min_gain: Option<f64>,
    pub max_swap_passes: Option<usize>,
    pub max_crossing_iterations: Option<usize>,
    pub max_optimizer_rounds: Option<usize>,

    pub trajectory_swap: Option<bool>,
    pub insert_missed: Option<bool>,
    pub crossing_removal: Option<bool>,

    /// 0 uses every available core
    pub solver_threads: Option<usize>,
    pub ring_vertices: Option<usize>,
    pub max_vertices: Option<usize>,
}

impl JsonSolverParams {
    pub fn apply_to(&self, params: &mut SolverParams) {
        if let Some(mode) = self.allocation_mode {
            params.allocation_mode = mode;
        }
        if let Some(filter) = self.priority_filter {
            params.priority_filter = Some(filter.into());
        }
        if let Some(pinned) = &self.pinned_targets {
            params.pinned_targets = pinned
                .iter()
                .map(|(target, vehicle)| (target.clone(), vehicle.clone()))
                .collect();
        }
        if let Some(max_exact_targets) = self.max_exact_targets {
            params.max_exact_targets = max_exact_targets;
        }
        if let Some(limit) = self.exact_time_limit {
            params.exact_time_limit = limit;
        }
        if let Some(iterations) = self.heuristic_max_iterations {
            params.heuristic_max_iterations = iterations;
        }
        if let Some(gain) = self.swap_min_gain {
            params.swap_min_gain = gain;
        }
        if let Some(passes) = self.max_swap_passes {
            params.max_swap_passes = passes;
        }
        if let Some(iterations) = self.max_crossing_iterations {
            params.max_crossing_iterations = iterations;
        }
        if let Some(rounds) = self.max_optimizer_rounds {
            params.max_optimizer_rounds = rounds;
        }
        if let Some(enabled) = self.trajectory_swap {
            params.trajectory_swap = enabled;
        }
        if let Some(enabled) = self.insert_missed {
            params.insert_missed = enabled;
        }
        if let Some(enabled) = self.crossing_removal {
            params.crossing_removal = enabled;
        }
        if let Some(threads) = self.solver_threads {
            params.solver_threads = match threads {
                0 => Threads::Auto,
                1 => Threads::Single,
                n => Threads::Multi(n),
            };
        }
        if let Some(ring_vertices) = self.ring_vertices {
            params.matrix.ring_vertices = ring_vertices;
        }
        if let Some(max_vertices) = self.max_vertices {
            params.matrix.max_vertices = max_vertices;
        }
    }

    pub fn to_params(&self) -> SolverParams {
        let mut params = SolverParams::default();
        self.apply_to(&mut params);
        params
    }
}

impl JsonMissionRequest {
    pub fn params(&self) -> SolverParams {
        self.params
            .as_ref()
            .map(JsonSolverParams::to_params)
            .unwrap_or_default()
    }

    pub fn into_parts(self) -> (Environment, Vec<VehicleConfig>) {
        (
            self.environment.into(),
            self.vehicles.into_iter().map(VehicleConfig::from).collect(),
        )
    }

    #[instrument(skip_all, level = "debug")]
    pub fn build_problem(self) -> Result<MissionProblem, ProblemError> {
        let (environment, vehicles) = self.into_parts();
        MissionProblem::new(environment, vehicles)
    }

    /// Request describing `problem`, used to persist replanned missions.
    pub fn from_problem(problem: &MissionProblem, params: Option<JsonSolverParams>) -> Self {
        JsonMissionRequest {
            environment: problem.environment().into(),
            vehicles: problem
                .vehicles()
                .iter()
                .map(|vehicle| JsonVehicle::from(vehicle.config()))
                .collect(),
            params,
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "Checkpoint")]
pub struct JsonCheckpoint {
    pub visited_targets: Vec<String>,
    pub vehicles: Vec<JsonVehicleCheckpoint>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "VehicleCheckpoint")]
pub struct JsonVehicleCheckpoint {
    pub vehicle_id: String,
    pub position: [f64; 2],
    pub distance_traveled: Option<f64>,
}

impl From<JsonCheckpoint> for Checkpoint {
    fn from(value: JsonCheckpoint) -> Self {
        Checkpoint {
            visited_targets: value.visited_targets,
            vehicles: value
                .vehicles
                .into_iter()
                .map(|vehicle| VehicleCheckpoint {
                    vehicle_id: vehicle.vehicle_id,
                    position: to_coord(vehicle.position),
                    distance_traveled: vehicle.distance_traveled,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename = "Route")]
pub struct JsonRoute {
    pub vehicle_id: String,
    pub waypoints: Vec<String>,
    pub trajectory: Vec<[f64; 2]>,

    #[serde(flatten)]
    pub summary: RouteSummary,
}

impl FromProblem<&Route> for JsonRoute {
    fn from_problem(value: &Route, problem: &MissionProblem) -> Self {
        JsonRoute {
            vehicle_id: problem.vehicle(value.vehicle()).id().to_owned(),
            waypoints: value
                .waypoints()
                .iter()
                .map(|&waypoint| problem.waypoint_id(waypoint).to_owned())
                .collect(),
            trajectory: value.trajectory().iter().copied().map(from_coord).collect(),
            summary: value.summary(problem),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(rename = "Solution")]
pub struct JsonSolution {
    pub routes: Vec<JsonRoute>,
    pub total_distance: f64,
    pub total_score: u64,
    pub log: Vec<OptimizationEvent>,

    pub orphaned: Vec<String>,
    pub unreachable: Vec<String>,
    pub filtered: Vec<String>,
    pub inside_zones: Vec<String>,
    pub unvisited: Vec<String>,
}

impl JsonSolution {
    /// Waypoint ids per vehicle id, as accepted by `Solution::from_routes`.
    pub fn route_ids(&self) -> Vec<(String, Vec<String>)> {
        self.routes
            .iter()
            .map(|route| (route.vehicle_id.clone(), route.waypoints.clone()))
            .collect()
    }
}

impl From<&Solution> for JsonSolution {
    fn from(value: &Solution) -> Self {
        let problem = value.problem();
        let ids = |waypoints: &[WaypointIdx]| {
            waypoints
                .iter()
                .map(|&waypoint| problem.waypoint_id(waypoint).to_owned())
                .collect::<Vec<_>>()
        };
        let allocation = value.allocation();

        JsonSolution {
            routes: value
                .routes()
                .iter()
                .map(|route| JsonRoute::from_problem(route, problem))
                .collect(),
            total_distance: value.total_distance(),
            total_score: value.total_score(),
            log: value.log().events().to_vec(),
            orphaned: ids(&allocation.orphaned),
            unreachable: ids(&allocation.unreachable),
            filtered: ids(&allocation.filtered),
            inside_zones: ids(&allocation.inside_zones),
            unvisited: ids(&value.unvisited_targets()),
        }
    }
}
