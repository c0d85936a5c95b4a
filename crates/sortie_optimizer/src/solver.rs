pub mod allocator;
pub mod cancellation;
pub mod error;
pub mod insertion;
pub mod mission_solver;
pub mod orienteering;
pub mod post_optimizer;
pub mod replanner;
pub mod solution;
pub mod solver_params;
pub mod two_opt;

pub use error::SolveError;
pub use mission_solver::{MissionSolver, optimize, replan, solve};
