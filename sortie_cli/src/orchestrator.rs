use anyhow::anyhow;
use sortie_optimizer::{
    json::types::{JsonCheckpoint, JsonMissionRequest, JsonSolution, JsonSolverParams},
    solver::{
        MissionSolver, cancellation::CancellationToken, solution::Solution,
        solver_params::SolverParams,
    },
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    command::MissionCommand,
    mission_store::{MissionRecord, MissionStore},
};

pub enum CommandOutcome {
    Mission(MissionRecord),
    Missions(Vec<MissionRecord>),
}

/// Executes mission commands against a mission store.
pub struct Orchestrator<S: MissionStore> {
    store: S,
    cancellation: CancellationToken,
}

impl<S: MissionStore> Orchestrator<S> {
    pub fn new(store: S) -> Self {
        Orchestrator {
            store,
            cancellation: CancellationToken::new(),
        }
    }

    #[instrument(skip_all, fields(command = command.name()))]
    pub fn execute(&self, command: MissionCommand) -> Result<CommandOutcome, anyhow::Error> {
        match command {
            MissionCommand::Solve { request } => self.solve(request).map(CommandOutcome::Mission),
            MissionCommand::Optimize { mission_id, params } => self
                .optimize(mission_id, params.as_ref())
                .map(CommandOutcome::Mission),
            MissionCommand::Replan {
                mission_id,
                checkpoint,
            } => self
                .replan(mission_id, checkpoint)
                .map(CommandOutcome::Mission),
            MissionCommand::List => self.store.list().map(CommandOutcome::Missions),
            MissionCommand::Show { mission_id } => {
                self.load(mission_id).map(CommandOutcome::Mission)
            }
        }
    }

    fn solver(&self, params: SolverParams) -> MissionSolver {
        MissionSolver::with_cancellation(params, self.cancellation.clone())
    }

    fn load(&self, mission_id: Uuid) -> Result<MissionRecord, anyhow::Error> {
        self.store
            .get(mission_id)?
            .ok_or_else(|| anyhow!("Unknown mission {mission_id}"))
    }

    fn restore(
        &self,
        record: &MissionRecord,
        solver: &MissionSolver,
    ) -> Result<Solution, anyhow::Error> {
        let problem = record.request.clone().build_problem()?;
        Ok(solver.restore(problem, record.solution.route_ids())?)
    }

    fn solve(&self, request: JsonMissionRequest) -> Result<MissionRecord, anyhow::Error> {
        let solver = self.solver(request.params());
        let problem = request.clone().build_problem()?;
        let solution = solver.solve_problem(problem, None)?;

        let record = MissionRecord::new(request, JsonSolution::from(&solution), None);
        self.store.put(&record)?;

        info!(
            mission = %record.id,
            score = record.solution.total_score,
            distance = record.solution.total_distance,
            "Mission solved"
        );

        Ok(record)
    }

    fn optimize(
        &self,
        mission_id: Uuid,
        overrides: Option<&JsonSolverParams>,
    ) -> Result<MissionRecord, anyhow::Error> {
        let mut record = self.load(mission_id)?;

        let mut params = record.request.params();
        if let Some(overrides) = overrides {
            overrides.apply_to(&mut params);
        }

        let solver = self.solver(params);
        let solution = self.restore(&record, &solver)?;
        let optimized = solver.optimize_solution(solution)?;

        record.update(JsonSolution::from(&optimized));
        self.store.put(&record)?;

        info!(
            mission = %record.id,
            events = record.solution.log.len(),
            score = record.solution.total_score,
            "Mission optimized"
        );

        Ok(record)
    }

    fn replan(
        &self,
        mission_id: Uuid,
        checkpoint: JsonCheckpoint,
    ) -> Result<MissionRecord, anyhow::Error> {
        let prior_record = self.load(mission_id)?;
        let solver = self.solver(prior_record.request.params());
        let prior = self.restore(&prior_record, &solver)?;

        let replanned = solver.replan(&prior, &checkpoint.into())?;
        let request =
            JsonMissionRequest::from_problem(replanned.problem(), prior_record.request.params.clone());

        let record = MissionRecord::new(request, JsonSolution::from(&replanned), Some(mission_id));
        self.store.put(&record)?;

        info!(
            mission = %record.id,
            parent = %mission_id,
            score = record.solution.total_score,
            "Mission replanned"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use sortie_optimizer::json::types::{JsonCheckpoint, JsonStartPoint, JsonVehicleCheckpoint};

    use super::*;
    use crate::{mission_store::InMemoryMissionStore, test_utils::create_test_request};

    fn mission(outcome: CommandOutcome) -> MissionRecord {
        match outcome {
            CommandOutcome::Mission(record) => record,
            CommandOutcome::Missions(_) => panic!("expected a single mission"),
        }
    }

    #[test]
    fn test_solve_and_show() {
        let orchestrator = Orchestrator::new(InMemoryMissionStore::new());

        let solved = mission(
            orchestrator
                .execute(MissionCommand::Solve {
                    request: create_test_request(),
                })
                .unwrap(),
        );
        assert_eq!(solved.solution.total_score, 6);

        let shown = mission(
            orchestrator
                .execute(MissionCommand::Show {
                    mission_id: solved.id,
                })
                .unwrap(),
        );
        assert_eq!(shown.id, solved.id);

        assert!(
            orchestrator
                .execute(MissionCommand::Show {
                    mission_id: Uuid::new_v4(),
                })
                .is_err()
        );
    }

    #[test]
    fn test_optimize_stored_mission_is_stable() {
        let orchestrator = Orchestrator::new(InMemoryMissionStore::new());
        let solved = orchestrator
            .solve(create_test_request())
            .unwrap();

        let optimized = mission(
            orchestrator
                .execute(MissionCommand::Optimize {
                    mission_id: solved.id,
                    params: None,
                })
                .unwrap(),
        );

        assert!(optimized.solution.log.is_empty());
        assert_eq!(optimized.solution.route_ids(), solved.solution.route_ids());
        assert!(optimized.updated_at >= solved.updated_at);
    }

    #[test]
    fn test_replan_creates_child_mission() {
        let orchestrator = Orchestrator::new(InMemoryMissionStore::new());
        let solved = orchestrator.solve(create_test_request()).unwrap();

        let checkpoint = JsonCheckpoint {
            visited_targets: vec!["T1".to_owned()],
            vehicles: vec![
                JsonVehicleCheckpoint {
                    vehicle_id: "D1".to_owned(),
                    position: [20.0, 0.0],
                    distance_traveled: Some(20.0),
                },
                JsonVehicleCheckpoint {
                    vehicle_id: "D2".to_owned(),
                    position: [100.0, 0.0],
                    distance_traveled: Some(0.0),
                },
            ],
        };

        let replanned = mission(
            orchestrator
                .execute(MissionCommand::Replan {
                    mission_id: solved.id,
                    checkpoint,
                })
                .unwrap(),
        );

        assert_eq!(replanned.parent, Some(solved.id));
        assert!(replanned.request.environment.targets.iter().all(|t| t.id != "T1"));

        let d1 = &replanned.request.vehicles[0];
        assert_eq!(d1.start, JsonStartPoint::Coordinates([20.0, 0.0]));
        assert!((d1.fuel_budget - 80.0).abs() < 1e-9);

        match orchestrator.execute(MissionCommand::List).unwrap() {
            CommandOutcome::Missions(records) => assert_eq!(records.len(), 2),
            CommandOutcome::Mission(_) => panic!("expected every mission"),
        }
    }
}
