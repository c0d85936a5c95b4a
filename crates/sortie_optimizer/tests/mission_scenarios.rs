use std::sync::Arc;

use fxhash::FxHashSet;
use geo::coord;
use sortie_matrix::{MatrixParams, ThreatZone, geometry::polyline_length};
use sortie_optimizer::{
    json::types::JsonSolution,
    problem::{
        MissionProblem,
        environment::{Base, Environment, Target},
        vehicle::{EndPoint, StartPoint, VehicleConfig, VehicleConfigBuilder},
    },
    solver::{
        optimize,
        post_optimizer::insert_missed::insert_missed,
        replan,
        replanner::{Checkpoint, VehicleCheckpoint},
        solution::{
            Solution,
            optimization_log::OptimizationEvent,
            route::{RouteOrigin, fits_budget, respects_order},
        },
        solve,
        solver_params::SolverParams,
    },
};

fn base(id: &str, x: f64, y: f64) -> Base {
    Base {
        id: id.to_owned(),
        coordinate: coord! { x: x, y: y },
    }
}

fn target(id: &str, x: f64, y: f64) -> Target {
    Target {
        id: id.to_owned(),
        coordinate: coord! { x: x, y: y },
        priority: None,
        target_type: None,
    }
}

fn vehicle(id: &str, start: &str, end: EndPoint, fuel_budget: f64) -> VehicleConfig {
    VehicleConfigBuilder::new(id, fuel_budget, StartPoint::Base(start.to_owned()), end).build()
}

/// T1..T33 on a 20 unit grid, five bases around it and a zone in the middle.
fn grid_environment() -> Environment {
    Environment {
        bases: vec![
            base("A1", 0.0, 0.0),
            base("A2", 120.0, 0.0),
            base("A3", 0.0, 120.0),
            base("A4", 120.0, 120.0),
            base("A5", 60.0, 130.0),
        ],
        targets: (0..33)
            .map(|i| {
                target(
                    &format!("T{}", i + 1),
                    (i % 6) as f64 * 20.0 + 10.0,
                    (i / 6) as f64 * 20.0 + 10.0,
                )
            })
            .collect(),
        threat_zones: vec![ThreatZone::new(coord! { x: 60.0, y: 60.0 }, 8.0)],
    }
}

fn grid_vehicles() -> Vec<VehicleConfig> {
    (1..=5)
        .map(|i| {
            vehicle(
                &format!("D{i}"),
                &format!("A{i}"),
                EndPoint::ReturnToStart,
                300.0,
            )
        })
        .collect()
}

fn assert_valid_solution(solution: &Solution) {
    let problem = solution.problem();
    let mut seen = FxHashSet::default();

    for route in solution.routes() {
        let vehicle = problem.vehicle(route.vehicle());

        assert_eq!(route.first(), vehicle.start());
        assert!(fits_budget(route.distance(), vehicle.fuel_budget()));
        assert!(respects_order(problem, route.waypoints()));

        for target in route.targets(problem) {
            assert!(seen.insert(target), "{} visited twice", problem.waypoint_id(target));
        }

        let trajectory = route.trajectory();
        assert!((polyline_length(trajectory) - route.distance()).abs() < 1e-6);
        assert_eq!(trajectory.first().copied(), Some(problem.coordinate(route.first())));
        assert_eq!(trajectory.last().copied(), Some(problem.coordinate(route.last())));
    }
}

#[test]
fn test_grid_mission_is_valid() {
    let solution = solve(grid_environment(), grid_vehicles(), &SolverParams::default()).unwrap();

    assert_valid_solution(&solution);
    assert!(solution.total_score() > 0);
    assert!(solution.allocation().inside_zones.is_empty());
}

#[test]
fn test_insert_missed_keeps_assigned_targets() {
    let problem = MissionProblem::new(grid_environment(), grid_vehicles()).unwrap();
    let matrix = problem.build_matrix(&MatrixParams::default(), None).unwrap();

    let mut solution = Solution::from_routes(
        Arc::new(problem),
        Arc::new(matrix),
        vec![
            ("D1", vec!["A1", "T26", "T28", "T22", "T17", "A1"]),
            ("D3", vec!["A3", "T29", "T9", "A3"]),
        ],
    )
    .unwrap();

    let insertions = insert_missed(&mut solution, &SolverParams::default()).unwrap();
    assert!(insertions > 0);
    assert_valid_solution(&solution);

    for id in ["T26", "T28", "T22", "T17", "T29", "T9"] {
        let index = solution.problem().waypoint_index(id).unwrap();
        assert!(solution.is_visited(index), "{id} was dropped");
    }

    // Existing targets keep their relative order
    let d1 = solution.route_ids("D1").unwrap();
    let kept = d1
        .iter()
        .filter(|id| ["T26", "T28", "T22", "T17"].contains(*id))
        .copied()
        .collect::<Vec<_>>();
    assert_eq!(kept, vec!["T26", "T28", "T22", "T17"]);

    let d3 = solution.route_ids("D3").unwrap();
    let kept = d3
        .iter()
        .filter(|id| ["T29", "T9"].contains(*id))
        .copied()
        .collect::<Vec<_>>();
    assert_eq!(kept, vec!["T29", "T9"]);
}

/// D1 flies y = 0, D2 flies y = 17.47, T1 sits 11.47 above D1's line.
fn corridor() -> (Environment, Vec<VehicleConfig>) {
    let environment = Environment {
        bases: vec![
            base("A1", 0.0, 0.0),
            base("A2", 100.0, 0.0),
            base("A3", 0.0, 17.47),
            base("A4", 100.0, 17.47),
        ],
        targets: vec![target("T1", 50.0, 11.47)],
        threat_zones: vec![],
    };
    let vehicles = vec![
        vehicle("D1", "A1", EndPoint::Base("A2".to_owned()), 150.0),
        vehicle("D2", "A3", EndPoint::Base("A4".to_owned()), 150.0),
    ];

    (environment, vehicles)
}

#[test]
fn test_swap_migrates_to_closer_trajectory() {
    let (environment, vehicles) = corridor();
    let solution = solve(environment, vehicles, &SolverParams::default()).unwrap();

    assert_eq!(solution.route_ids("D1").unwrap(), vec!["A1", "A2"]);
    assert_eq!(solution.route_ids("D2").unwrap(), vec!["A3", "T1", "A4"]);

    let migrations = solution.log().migrations().collect::<Vec<_>>();
    assert_eq!(migrations.len(), 1);

    match migrations[0] {
        OptimizationEvent::Migration {
            target,
            from_vehicle,
            to_vehicle,
            ssd,
            osd,
            savings,
        } => {
            assert_eq!(target, "T1");
            assert_eq!(from_vehicle, "D1");
            assert_eq!(to_vehicle, "D2");
            assert!((ssd - 11.47).abs() < 1e-6);
            assert!((osd - 6.0).abs() < 1e-6);
            assert!((savings - 5.47).abs() < 1e-6);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_optimizing_a_solved_mission_changes_nothing() {
    let (environment, vehicles) = corridor();
    let params = SolverParams::default();

    let solved = solve(environment.clone(), vehicles.clone(), &params).unwrap();
    let optimized = optimize(&solved, environment, vehicles, &params).unwrap();

    assert!(optimized.log().is_empty());
    assert_eq!(solved.route_ids("D1"), optimized.route_ids("D1"));
    assert_eq!(solved.route_ids("D2"), optimized.route_ids("D2"));
}

#[test]
fn test_checkpoint_uses_remaining_fuel() {
    let environment = Environment {
        bases: vec![base("A1", 0.0, 0.0), base("A2", 100.0, 40.0)],
        targets: vec![target("TN", 100.0, 38.0), target("TF", 100.0, -90.0)],
        threat_zones: vec![],
    };
    let params = SolverParams::default();
    let prior = solve(
        environment,
        vec![vehicle("D1", "A1", EndPoint::Flexible, 200.0)],
        &params,
    )
    .unwrap();

    let checkpoint = Checkpoint {
        visited_targets: vec![],
        vehicles: vec![VehicleCheckpoint {
            vehicle_id: "D1".to_owned(),
            position: coord! { x: 100.0, y: 0.0 },
            distance_traveled: Some(115.0),
        }],
    };

    let replanned = replan(&prior, &checkpoint, &params).unwrap();
    let problem = replanned.problem();
    let d1 = problem.vehicle_index("D1").unwrap();

    assert!((problem.vehicle(d1).fuel_budget() - 85.0).abs() < 1e-9);
    assert_eq!(
        replanned.route_ids("D1").unwrap(),
        vec!["D1@start", "TN", "A2"]
    );
    assert!((replanned.route(d1).distance() - 40.0).abs() < 1e-9);

    let json = JsonSolution::from(&replanned);
    assert_eq!(json.unreachable, vec!["TF".to_owned()]);
    assert!(json.unvisited.contains(&"TF".to_owned()));
}

#[test]
fn test_checkpoint_without_distance_is_rejected() {
    let (environment, vehicles) = corridor();
    let params = SolverParams::default();
    let prior = solve(environment, vehicles, &params).unwrap();

    let checkpoint = Checkpoint {
        visited_targets: vec!["T1".to_owned()],
        vehicles: vec![VehicleCheckpoint {
            vehicle_id: "D1".to_owned(),
            position: coord! { x: 10.0, y: 0.0 },
            distance_traveled: None,
        }],
    };

    assert!(replan(&prior, &checkpoint, &params).is_err());
}

#[test]
fn test_drained_vehicle_hands_over_its_targets() {
    let environment = Environment {
        bases: vec![base("A1", 0.0, 0.0), base("A2", 100.0, 0.0)],
        targets: vec![target("TA", 20.0, 10.0), target("TB", 80.0, 10.0)],
        threat_zones: vec![],
    };
    let params = SolverParams::default();
    let prior = solve(
        environment,
        vec![
            vehicle("D1", "A1", EndPoint::ReturnToStart, 200.0),
            vehicle("D2", "A2", EndPoint::ReturnToStart, 200.0),
        ],
        &params,
    )
    .unwrap();

    // D1 is routed first and takes both targets
    assert_eq!(prior.route_by_id("D1").unwrap().target_count(), 2);

    let checkpoint = Checkpoint {
        visited_targets: vec![],
        vehicles: vec![
            VehicleCheckpoint {
                vehicle_id: "D1".to_owned(),
                position: coord! { x: 30.0, y: 0.0 },
                distance_traveled: Some(200.0),
            },
            VehicleCheckpoint {
                vehicle_id: "D2".to_owned(),
                position: coord! { x: 90.0, y: 0.0 },
                distance_traveled: Some(10.0),
            },
        ],
    };

    let replanned = replan(&prior, &checkpoint, &params).unwrap();
    assert_valid_solution(&replanned);

    let d1 = replanned.route_by_id("D1").unwrap();
    assert_eq!(replanned.route_ids("D1").unwrap(), vec!["D1@start"]);
    assert_eq!(d1.origin(), RouteOrigin::Disabled);
    assert_eq!(d1.distance(), 0.0);

    let d2 = replanned.route_by_id("D2").unwrap();
    assert_eq!(d2.target_count(), 2);
    assert_eq!(replanned.route_ids("D2").unwrap().last().copied(), Some("A2"));
    assert!(fits_budget(d2.distance(), 190.0));
}

#[test]
fn test_zone_boundary_counts_as_outside() {
    let environment = Environment {
        bases: vec![base("A1", 0.0, 0.0)],
        targets: vec![target("TB", 50.0, 0.0), target("TI", 50.0, 8.0)],
        threat_zones: vec![ThreatZone::new(coord! { x: 50.0, y: 10.0 }, 10.0)],
    };

    let solution = solve(
        environment,
        vec![vehicle("D1", "A1", EndPoint::ReturnToStart, 200.0)],
        &SolverParams::default(),
    )
    .unwrap();

    assert_eq!(solution.route_ids("D1").unwrap(), vec!["A1", "TB", "A1"]);
    assert!((solution.total_distance() - 100.0).abs() < 1e-9);

    let json = JsonSolution::from(&solution);
    assert_eq!(json.inside_zones, vec!["TI".to_owned()]);
    assert!(!json.unreachable.contains(&"TI".to_owned()));
}
