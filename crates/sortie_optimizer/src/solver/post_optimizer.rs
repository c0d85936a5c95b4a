pub mod crossing_removal;
pub mod insert_missed;
pub mod trajectory_swap;

use tracing::{debug, instrument, warn};

use crate::solver::{
    cancellation::CancellationToken, error::SolveError, solution::Solution,
    solver_params::SolverParams,
};

use crossing_removal::remove_crossings;
use insert_missed::insert_missed;
use trajectory_swap::trajectory_swap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizationStats {
    pub rounds: usize,
    pub migrations: usize,
    pub insertions: usize,
    pub uncrossings: usize,
}

impl OptimizationStats {
    pub fn changes(&self) -> usize {
        self.migrations + self.insertions + self.uncrossings
    }
}

/// Runs swap, insert-missed and crossing removal in rounds until a round
/// changes nothing. Each phase can be switched off in `params`.
#[instrument(skip_all, level = "debug")]
pub fn post_optimize(
    solution: &mut Solution,
    params: &SolverParams,
    cancellation: &CancellationToken,
) -> Result<OptimizationStats, SolveError> {
    let mut stats = OptimizationStats::default();

    if !params.any_optimizer_phase() {
        return Ok(stats);
    }

    for _ in 0..params.max_optimizer_rounds {
        cancellation.check("post-optimization")?;

        let mut round = OptimizationStats {
            rounds: 1,
            ..OptimizationStats::default()
        };

        if params.trajectory_swap {
            round.migrations = trajectory_swap(solution, params);
        }

        if params.insert_missed {
            round.insertions = insert_missed(solution, params)?;
        }

        if params.crossing_removal {
            round.uncrossings = remove_crossings(solution, params);
        }

        debug!(
            migrations = round.migrations,
            insertions = round.insertions,
            uncrossings = round.uncrossings,
            "Post-optimization round"
        );

        stats.rounds += 1;
        stats.migrations += round.migrations;
        stats.insertions += round.insertions;
        stats.uncrossings += round.uncrossings;

        if round.changes() == 0 {
            return Ok(stats);
        }
    }

    warn!(
        rounds = params.max_optimizer_rounds,
        "Post-optimization stopped before converging"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        create_test_environment, create_test_problem, create_test_solution, create_test_vehicle,
    };

    #[test]
    fn test_second_run_changes_nothing() {
        let mut solution = create_test_solution(
            create_test_environment(),
            vec![
                create_test_vehicle("D1", "A1", 100.0),
                create_test_vehicle("D2", "A2", 100.0),
            ],
            vec![("D1", vec!["A1", "T1", "A1"])],
        );
        let params = SolverParams::default();
        let cancellation = CancellationToken::new();

        let first = post_optimize(&mut solution, &params, &cancellation).unwrap();
        assert!(first.changes() > 0);

        let events = solution.log().len();
        let second = post_optimize(&mut solution, &params, &cancellation).unwrap();

        assert_eq!(second.changes(), 0);
        assert_eq!(second.rounds, 1);
        assert_eq!(solution.log().len(), events);
    }

    #[test]
    fn test_cancelled_before_first_round() {
        let (problem, matrix) = create_test_problem(
            create_test_environment(),
            vec![create_test_vehicle("D1", "A1", 100.0)],
        );
        let mut solution = Solution::from_routes(problem, matrix, Vec::<(&str, Vec<&str>)>::new()).unwrap();
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        assert!(matches!(
            post_optimize(&mut solution, &SolverParams::default(), &cancellation),
            Err(SolveError::Cancelled { .. })
        ));
    }

    #[test]
    fn test_disabled_phases() {
        let (problem, matrix) = create_test_problem(
            create_test_environment(),
            vec![create_test_vehicle("D1", "A1", 100.0)],
        );
        let mut solution = Solution::from_routes(problem, matrix, Vec::<(&str, Vec<&str>)>::new()).unwrap();
        let params = SolverParams {
            trajectory_swap: false,
            insert_missed: false,
            crossing_removal: false,
            ..SolverParams::default()
        };

        let stats = post_optimize(&mut solution, &params, &CancellationToken::new()).unwrap();

        assert_eq!(stats, OptimizationStats::default());
        assert_eq!(solution.total_score(), 0);
    }
}
