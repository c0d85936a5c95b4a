pub mod environment;
pub mod error;
pub mod mission_problem;
pub mod vehicle;
pub mod waypoint;

pub use error::ProblemError;
pub use mission_problem::MissionProblem;
