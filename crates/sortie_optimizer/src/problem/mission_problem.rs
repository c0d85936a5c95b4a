use fxhash::{FxHashMap, FxHashSet};
use geo::Coord;
use smallvec::SmallVec;
use sortie_matrix::{
    DistanceMatrix, MatrixError, MatrixParams, MatrixPoint, ThreatZone, geometry::is_inside_any_zone,
};
use tracing::{debug, instrument};

use crate::{
    problem::{
        environment::Environment,
        error::ProblemError,
        vehicle::{EndPoint, StartPoint, Vehicle, VehicleConfig, VehicleEnd, VehicleIdx},
        waypoint::{Waypoint, WaypointIdx, WaypointKind},
    },
    utils::enumerate_idx::EnumerateIdx,
};

/// Resolved mission: every base, target and synthetic position as a waypoint
/// indexed the same way as the distance matrix.
#[derive(Debug, Clone)]
pub struct MissionProblem {
    environment: Environment,
    waypoints: Vec<Waypoint>,
    index: FxHashMap<String, WaypointIdx>,
    bases: Vec<WaypointIdx>,
    targets: Vec<WaypointIdx>,
    vehicles: Vec<Vehicle>,
}

fn is_finite(coordinate: Coord) -> bool {
    coordinate.x.is_finite() && coordinate.y.is_finite()
}

impl MissionProblem {
    #[instrument(skip_all, level = "debug")]
    pub fn new(
        environment: Environment,
        configs: Vec<VehicleConfig>,
    ) -> Result<MissionProblem, ProblemError> {
        if configs.is_empty() {
            return Err(ProblemError::NoVehicles);
        }

        for (index, zone) in environment.threat_zones.iter().enumerate() {
            if !is_finite(zone.center()) || !zone.radius().is_finite() || zone.radius() <= 0.0 {
                return Err(ProblemError::InvalidThreatZone(index));
            }
        }

        let mut waypoints: Vec<Waypoint> = Vec::new();

        let mut bases = environment.bases.iter().collect::<Vec<_>>();
        bases.sort_by(|a, b| a.id.cmp(&b.id));
        for base in bases {
            waypoints.push(Waypoint::base(base.id.clone(), base.coordinate));
        }

        let mut targets = environment.targets.iter().collect::<Vec<_>>();
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        for target in targets {
            waypoints.push(Waypoint::target(
                target.id.clone(),
                target.coordinate,
                target.priority,
                target.target_type.clone(),
            ));
        }

        let mut seen_vehicles = FxHashSet::default();
        for config in &configs {
            if !seen_vehicles.insert(config.id()) {
                return Err(ProblemError::DuplicateVehicle(config.id().to_owned()));
            }

            if !config.fuel_budget().is_finite() || config.fuel_budget() < 0.0 {
                return Err(ProblemError::InvalidFuelBudget {
                    vehicle: config.id().to_owned(),
                    budget: config.fuel_budget(),
                });
            }

            if let StartPoint::Coordinate(coordinate) = config.start() {
                waypoints.push(Waypoint::synthetic(
                    format!("{}@start", config.id()),
                    *coordinate,
                ));
            }

            if let EndPoint::Coordinate(coordinate) = config.end() {
                waypoints.push(Waypoint::synthetic(
                    format!("{}@end", config.id()),
                    *coordinate,
                ));
            }
        }

        let mut index = FxHashMap::default();
        for (waypoint_idx, waypoint) in waypoints.iter().enumerate_idx() {
            if !is_finite(waypoint.coordinate()) {
                return Err(ProblemError::InvalidCoordinate(waypoint.id().to_owned()));
            }

            if index.insert(waypoint.id().to_owned(), waypoint_idx).is_some() {
                return Err(ProblemError::DuplicateWaypoint(waypoint.id().to_owned()));
            }
        }

        let base_indices: Vec<WaypointIdx> = waypoints
            .iter()
            .enumerate_idx()
            .filter(|(_, waypoint)| waypoint.kind() == WaypointKind::Base)
            .map(|(waypoint_idx, _)| waypoint_idx)
            .collect();
        let target_indices: Vec<WaypointIdx> = waypoints
            .iter()
            .enumerate_idx()
            .filter(|(_, waypoint)| waypoint.is_target())
            .map(|(waypoint_idx, _)| waypoint_idx)
            .collect();

        let resolve_base = |config: &VehicleConfig, id: &str| -> Result<WaypointIdx, ProblemError> {
            base_indices
                .iter()
                .copied()
                .find(|&base| waypoints[base].id() == id)
                .ok_or_else(|| ProblemError::UnknownBase {
                    vehicle: config.id().to_owned(),
                    base: id.to_owned(),
                })
        };

        let mut vehicles = Vec::with_capacity(configs.len());
        for config in configs {
            let start = match config.start() {
                StartPoint::Base(id) => resolve_base(&config, id)?,
                StartPoint::Coordinate(_) => index[&format!("{}@start", config.id())],
            };

            let end = match config.end() {
                EndPoint::Base(id) => VehicleEnd::Fixed(resolve_base(&config, id)?),
                EndPoint::Coordinate(_) => VehicleEnd::Fixed(index[&format!("{}@end", config.id())]),
                EndPoint::ReturnToStart => VehicleEnd::Fixed(start),
                EndPoint::Flexible => {
                    if base_indices.is_empty() {
                        return Err(ProblemError::NoBases(config.id().to_owned()));
                    }
                    VehicleEnd::AnyBase
                }
            };

            vehicles.push(Vehicle::new(config, start, end));
        }

        debug!(
            bases = base_indices.len(),
            targets = target_indices.len(),
            vehicles = vehicles.len(),
            zones = environment.threat_zones.len(),
            "Built mission problem"
        );

        Ok(MissionProblem {
            environment,
            waypoints,
            index,
            bases: base_indices,
            targets: target_indices,
            vehicles,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn threat_zones(&self) -> &[ThreatZone] {
        &self.environment.threat_zones
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn waypoint(&self, index: WaypointIdx) -> &Waypoint {
        &self.waypoints[index]
    }

    pub fn waypoint_id(&self, index: WaypointIdx) -> &str {
        self.waypoints[index].id()
    }

    pub fn coordinate(&self, index: WaypointIdx) -> Coord {
        self.waypoints[index].coordinate()
    }

    pub fn waypoint_index(&self, id: &str) -> Option<WaypointIdx> {
        self.index.get(id).copied()
    }

    /// Bases sorted by id.
    pub fn bases(&self) -> &[WaypointIdx] {
        &self.bases
    }

    /// Targets sorted by id.
    pub fn targets(&self) -> &[WaypointIdx] {
        &self.targets
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, index: VehicleIdx) -> &Vehicle {
        &self.vehicles[index]
    }

    pub fn vehicle_index(&self, id: &str) -> Option<VehicleIdx> {
        self.vehicles
            .iter()
            .position(|vehicle| vehicle.id() == id)
            .map(VehicleIdx::new)
    }

    pub fn vehicle_indices(&self) -> impl Iterator<Item = VehicleIdx> + use<> {
        (0..self.vehicles.len()).map(VehicleIdx::new)
    }

    /// Vehicle indices sorted by vehicle id.
    pub fn vehicles_by_id(&self) -> Vec<VehicleIdx> {
        let mut vehicles = self.vehicle_indices().collect::<Vec<_>>();
        vehicles.sort_by(|&a, &b| self.vehicle(a).id().cmp(self.vehicle(b).id()));
        vehicles
    }

    pub fn vehicle_configs(&self) -> Vec<VehicleConfig> {
        self.vehicles
            .iter()
            .map(|vehicle| vehicle.config().clone())
            .collect()
    }

    /// Waypoints where the route of `vehicle` may end, sorted by id.
    pub fn end_candidates(&self, vehicle: VehicleIdx) -> SmallVec<[WaypointIdx; 4]> {
        match self.vehicle(vehicle).end() {
            VehicleEnd::Fixed(end) => SmallVec::from_elem(end, 1),
            VehicleEnd::AnyBase => self.bases.iter().copied().collect(),
        }
    }

    pub fn is_allowed_end(&self, vehicle: VehicleIdx, waypoint: WaypointIdx) -> bool {
        match self.vehicle(vehicle).end() {
            VehicleEnd::Fixed(end) => end == waypoint,
            VehicleEnd::AnyBase => self.bases.contains(&waypoint),
        }
    }

    pub fn is_inside_zone(&self, waypoint: WaypointIdx) -> bool {
        is_inside_any_zone(self.coordinate(waypoint), self.threat_zones())
    }

    pub fn matrix_points(&self) -> Vec<MatrixPoint> {
        self.waypoints
            .iter()
            .map(|waypoint| MatrixPoint::new(waypoint.id(), waypoint.coordinate()))
            .collect()
    }

    pub fn build_matrix(
        &self,
        params: &MatrixParams,
        previous: Option<&DistanceMatrix>,
    ) -> Result<DistanceMatrix, MatrixError> {
        DistanceMatrix::build_with_previous(
            self.matrix_points(),
            self.environment.threat_zones.clone(),
            params,
            previous,
        )
    }
}
