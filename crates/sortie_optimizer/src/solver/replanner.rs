use fxhash::{FxHashMap, FxHashSet};
use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    problem::{
        MissionProblem,
        environment::Environment,
        vehicle::{EndPoint, StartPoint, VehicleConfig},
    },
    solver::error::SolveError,
};

/// Where a vehicle is mid-mission and how far it flew to get there.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VehicleCheckpoint {
    pub vehicle_id: String,
    pub position: Coord,
    pub distance_traveled: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    pub visited_targets: Vec<String>,
    pub vehicles: Vec<VehicleCheckpoint>,
}

/// Remaining mission after `checkpoint`: visited targets are dropped, every
/// enabled vehicle starts from its current position with
/// `budget - distance_traveled` fuel. A vehicle left without fuel is disabled.
#[instrument(skip_all, level = "debug")]
pub fn checkpoint_problem(
    prior: &MissionProblem,
    checkpoint: &Checkpoint,
) -> Result<(Environment, Vec<VehicleConfig>), SolveError> {
    let environment = prior.environment();

    for target in &checkpoint.visited_targets {
        if environment.target(target).is_none() {
            return Err(SolveError::UnknownTarget(target.clone()));
        }
    }

    let mut positions: FxHashMap<&str, &VehicleCheckpoint> = FxHashMap::default();
    for vehicle in &checkpoint.vehicles {
        if prior.vehicle_index(&vehicle.vehicle_id).is_none() {
            return Err(SolveError::UnknownVehicle(vehicle.vehicle_id.clone()));
        }
        positions.insert(vehicle.vehicle_id.as_str(), vehicle);
    }

    let mut configs = Vec::with_capacity(prior.vehicles().len());

    for vehicle in prior.vehicles() {
        let mut config = vehicle.config().clone();

        if !config.enabled() {
            configs.push(config);
            continue;
        }

        let state = positions.get(config.id()).copied();
        let traveled = state
            .and_then(|state| state.distance_traveled)
            .ok_or_else(|| SolveError::MissingDistanceTraveled {
                vehicle: config.id().to_owned(),
            })?;

        if !traveled.is_finite() || traveled < 0.0 {
            return Err(SolveError::NegativeDistanceTraveled {
                vehicle: config.id().to_owned(),
                traveled,
            });
        }

        let budget = config.fuel_budget();
        if traveled > budget {
            return Err(SolveError::TraveledExceedsBudget {
                vehicle: config.id().to_owned(),
                traveled,
                budget,
            });
        }

        let remaining = budget - traveled;

        if matches!(config.end(), EndPoint::ReturnToStart) {
            let original_start = match config.start() {
                StartPoint::Base(base) => EndPoint::Base(base.clone()),
                StartPoint::Coordinate(coordinate) => EndPoint::Coordinate(*coordinate),
            };
            config.set_end(original_start);
        }

        if let Some(state) = state {
            config.set_start(StartPoint::Coordinate(state.position));
        }

        if remaining <= 0.0 {
            info!(vehicle = config.id(), traveled, budget, "Vehicle out of fuel, disabling it");
            config.set_enabled(false);
            config.set_fuel_budget(0.0);
        } else {
            config.set_fuel_budget(remaining);
        }

        configs.push(config);
    }

    let visited = checkpoint
        .visited_targets
        .iter()
        .map(String::as_str)
        .collect::<FxHashSet<_>>();

    info!(
        visited = visited.len(),
        vehicles = configs.len(),
        "Replanning from checkpoint"
    );

    Ok((environment.without_targets(&visited), configs))
}

#[cfg(test)]
mod tests {
    use geo::coord;

    use super::*;
    use crate::test_utils::{create_test_environment, create_test_vehicle};

    fn prior() -> MissionProblem {
        MissionProblem::new(
            create_test_environment(),
            vec![
                create_test_vehicle("D1", "A1", 200.0),
                create_test_vehicle("D2", "A2", 100.0),
            ],
        )
        .unwrap()
    }

    fn at(vehicle_id: &str, x: f64, traveled: Option<f64>) -> VehicleCheckpoint {
        VehicleCheckpoint {
            vehicle_id: vehicle_id.to_owned(),
            position: coord! { x: x, y: 0.0 },
            distance_traveled: traveled,
        }
    }

    #[test]
    fn test_remaining_budget_and_start() {
        let checkpoint = Checkpoint {
            visited_targets: vec!["T1".to_owned()],
            vehicles: vec![at("D1", 30.0, Some(115.0)), at("D2", 90.0, Some(100.0))],
        };

        let (environment, configs) = checkpoint_problem(&prior(), &checkpoint).unwrap();

        assert!(environment.target("T1").is_none());
        assert_eq!(environment.targets.len(), 2);

        assert!((configs[0].fuel_budget() - 85.0).abs() < 1e-9);
        assert_eq!(
            configs[0].start(),
            &StartPoint::Coordinate(coord! { x: 30.0, y: 0.0 })
        );
        assert_eq!(configs[0].end(), &EndPoint::Base("A1".to_owned()));

        assert!(!configs[1].enabled());
        assert_eq!(configs[1].fuel_budget(), 0.0);
    }

    #[test]
    fn test_rejects_invalid_checkpoints() {
        let problem = prior();
        let replan = |visited: Vec<&str>, vehicles: Vec<VehicleCheckpoint>| {
            checkpoint_problem(
                &problem,
                &Checkpoint {
                    visited_targets: visited.into_iter().map(str::to_owned).collect(),
                    vehicles,
                },
            )
        };

        assert!(matches!(
            replan(vec!["T9"], vec![]),
            Err(SolveError::UnknownTarget(_))
        ));
        assert!(matches!(
            replan(vec![], vec![at("D9", 0.0, Some(1.0))]),
            Err(SolveError::UnknownVehicle(_))
        ));
        assert!(matches!(
            replan(vec![], vec![at("D1", 0.0, Some(1.0))]),
            Err(SolveError::MissingDistanceTraveled { .. })
        ));
        assert!(matches!(
            replan(vec![], vec![at("D1", 0.0, None), at("D2", 0.0, Some(1.0))]),
            Err(SolveError::MissingDistanceTraveled { .. })
        ));
        assert!(matches!(
            replan(vec![], vec![at("D1", 0.0, Some(-1.0)), at("D2", 0.0, Some(1.0))]),
            Err(SolveError::NegativeDistanceTraveled { .. })
        ));
        assert!(matches!(
            replan(vec![], vec![at("D1", 0.0, Some(250.0)), at("D2", 0.0, Some(1.0))]),
            Err(SolveError::TraveledExceedsBudget { .. })
        ));
    }
}
