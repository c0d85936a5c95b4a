use std::sync::Arc;

use sortie_matrix::{DistanceMatrix, cache::build_cached};
use tracing::{info, instrument};

use crate::{
    problem::{MissionProblem, environment::Environment, vehicle::VehicleConfig},
    solver::{
        allocator::allocate,
        cancellation::CancellationToken,
        error::SolveError,
        orienteering::route_vehicles,
        post_optimizer::post_optimize,
        replanner::{Checkpoint, checkpoint_problem},
        solution::Solution,
        solver_params::SolverParams,
    },
};

/// Runs the mission pipeline: allocation, routing of every vehicle and the
/// post-optimization rounds. Cancellation is honored between phases.
pub struct MissionSolver {
    params: SolverParams,
    cancellation: CancellationToken,
}

impl MissionSolver {
    pub fn new(params: SolverParams) -> Self {
        MissionSolver {
            params,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(params: SolverParams, cancellation: CancellationToken) -> Self {
        MissionSolver {
            params,
            cancellation,
        }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Token cancelling this solver, shareable with another thread.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn solve(
        &self,
        environment: Environment,
        vehicles: Vec<VehicleConfig>,
    ) -> Result<Solution, SolveError> {
        let problem = MissionProblem::new(environment, vehicles)?;
        self.solve_problem(problem, None)
    }

    /// Solves `problem`, reusing the legs of `previous` that are still valid.
    /// Without a previous matrix, the on-disk cache is tried first.
    pub fn solve_problem(
        &self,
        problem: MissionProblem,
        previous: Option<&DistanceMatrix>,
    ) -> Result<Solution, SolveError> {
        let matrix = match previous {
            Some(previous) => problem.build_matrix(&self.params.matrix, Some(previous))?,
            None => build_cached(
                problem.matrix_points(),
                problem.threat_zones().to_vec(),
                &self.params.matrix,
            )?,
        };
        self.cancellation.check("distance matrix")?;

        self.solve_with_matrix(Arc::new(problem), Arc::new(matrix))
    }

    #[instrument(skip_all, level = "debug")]
    pub fn solve_with_matrix(
        &self,
        problem: Arc<MissionProblem>,
        matrix: Arc<DistanceMatrix>,
    ) -> Result<Solution, SolveError> {
        let allocation = allocate(&problem, &matrix, &self.params);
        self.cancellation.check("allocation")?;

        let routes = route_vehicles(&problem, &matrix, &self.params, &allocation)?;
        self.cancellation.check("routing")?;

        let mut solution = Solution::new(problem, matrix, routes, allocation);
        post_optimize(&mut solution, &self.params, &self.cancellation)?;

        info!(
            score = solution.total_score(),
            distance = solution.total_distance(),
            visited = solution.visited_targets().len(),
            events = solution.log().len(),
            "Mission solved"
        );

        Ok(solution)
    }

    /// Rebuilds a solution of `problem` from stored waypoint id sequences.
    pub fn restore<I, S>(&self, problem: MissionProblem, routes: I) -> Result<Solution, SolveError>
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: AsRef<str>,
    {
        let matrix = build_cached(
            problem.matrix_points(),
            problem.threat_zones().to_vec(),
            &self.params.matrix,
        )?;

        let mut solution = Solution::from_routes(Arc::new(problem), Arc::new(matrix), routes)?;
        let allocation = allocate(solution.problem(), solution.matrix(), &self.params);
        solution.set_allocation(allocation);

        Ok(solution)
    }

    /// Post-optimizes the routes of `solution` against a possibly updated
    /// environment and fleet. Routes are carried over by vehicle id.
    pub fn optimize(
        &self,
        solution: &Solution,
        environment: Environment,
        vehicles: Vec<VehicleConfig>,
    ) -> Result<Solution, SolveError> {
        let problem = MissionProblem::new(environment, vehicles)?;
        let matrix = problem.build_matrix(&self.params.matrix, Some(solution.matrix().as_ref()))?;

        let routes = problem
            .vehicles()
            .iter()
            .filter_map(|vehicle| {
                solution.route_ids(vehicle.id()).map(|ids| {
                    (
                        vehicle.id().to_owned(),
                        ids.into_iter().map(str::to_owned).collect::<Vec<_>>(),
                    )
                })
            })
            .collect::<Vec<_>>();

        let rebound = Solution::from_routes(Arc::new(problem), Arc::new(matrix), routes)?;
        self.optimize_solution(rebound)
    }

    #[instrument(skip_all, level = "debug")]
    pub fn optimize_solution(&self, mut solution: Solution) -> Result<Solution, SolveError> {
        let allocation = allocate(solution.problem(), solution.matrix(), &self.params);
        solution.set_allocation(allocation);

        let stats = post_optimize(&mut solution, &self.params, &self.cancellation)?;

        info!(
            rounds = stats.rounds,
            migrations = stats.migrations,
            insertions = stats.insertions,
            uncrossings = stats.uncrossings,
            "Mission optimized"
        );

        Ok(solution)
    }

    /// Solves what is left of the mission of `prior` after `checkpoint`.
    pub fn replan(&self, prior: &Solution, checkpoint: &Checkpoint) -> Result<Solution, SolveError> {
        let (environment, vehicles) = checkpoint_problem(prior.problem(), checkpoint)?;
        let problem = MissionProblem::new(environment, vehicles)?;

        self.solve_problem(problem, Some(prior.matrix().as_ref()))
    }
}

pub fn solve(
    environment: Environment,
    vehicles: Vec<VehicleConfig>,
    params: &SolverParams,
) -> Result<Solution, SolveError> {
    MissionSolver::new(params.clone()).solve(environment, vehicles)
}

pub fn optimize(
    solution: &Solution,
    environment: Environment,
    vehicles: Vec<VehicleConfig>,
    params: &SolverParams,
) -> Result<Solution, SolveError> {
    MissionSolver::new(params.clone()).optimize(solution, environment, vehicles)
}

pub fn replan(
    prior: &Solution,
    checkpoint: &Checkpoint,
    params: &SolverParams,
) -> Result<Solution, SolveError> {
    MissionSolver::new(params.clone()).replan(prior, checkpoint)
}
