use std::sync::Arc;

use geo::coord;
use sortie_matrix::{DistanceMatrix, MatrixParams};

use crate::{
    problem::{
        MissionProblem,
        environment::{Base, Environment, Target},
        vehicle::{EndPoint, StartPoint, VehicleConfig, VehicleConfigBuilder},
    },
    solver::solution::Solution,
};

pub fn create_test_base(id: &str, x: f64, y: f64) -> Base {
    Base {
        id: id.to_owned(),
        coordinate: coord! { x: x, y: y },
    }
}

pub fn create_test_target(id: &str, x: f64, y: f64, priority: u32) -> Target {
    Target {
        id: id.to_owned(),
        coordinate: coord! { x: x, y: y },
        priority: Some(priority),
        target_type: None,
    }
}

/// Two bases 100 apart on the x axis, three targets between them.
pub fn create_test_environment() -> Environment {
    Environment {
        bases: vec![
            create_test_base("A1", 0.0, 0.0),
            create_test_base("A2", 100.0, 0.0),
        ],
        targets: vec![
            create_test_target("T1", 20.0, 0.0, 1),
            create_test_target("T2", 40.0, 10.0, 2),
            create_test_target("T3", 60.0, -10.0, 3),
        ],
        threat_zones: vec![],
    }
}

pub fn create_test_vehicle(id: &str, base: &str, fuel_budget: f64) -> VehicleConfig {
    VehicleConfigBuilder::new(
        id,
        fuel_budget,
        StartPoint::Base(base.to_owned()),
        EndPoint::ReturnToStart,
    )
    .build()
}

pub fn create_test_problem(
    environment: Environment,
    vehicles: Vec<VehicleConfig>,
) -> (Arc<MissionProblem>, Arc<DistanceMatrix>) {
    let problem = MissionProblem::new(environment, vehicles).unwrap();
    let matrix = problem.build_matrix(&MatrixParams::default(), None).unwrap();

    (Arc::new(problem), Arc::new(matrix))
}

pub fn create_test_solution(
    environment: Environment,
    vehicles: Vec<VehicleConfig>,
    routes: Vec<(&str, Vec<&str>)>,
) -> Solution {
    let (problem, matrix) = create_test_problem(environment, vehicles);
    Solution::from_routes(problem, matrix, routes).unwrap()
}
