pub mod mission_solution;
pub mod optimization_log;
pub mod route;

pub use mission_solution::Solution;
