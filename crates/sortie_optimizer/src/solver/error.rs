use sortie_matrix::MatrixError;
use thiserror::Error;

use crate::problem::ProblemError;

#[derive(Error, Debug)]
pub enum SolveError {
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error("Solve cancelled during {phase}")]
    Cancelled { phase: &'static str },
    #[error("Previously visited targets were lost while inserting missed targets: {missing:?}")]
    LostTargets { missing: Vec<String> },
    #[error("Missing distance traveled for vehicle {vehicle}")]
    MissingDistanceTraveled { vehicle: String },
    #[error("Vehicle {vehicle} traveled {traveled} but its budget is {budget}")]
    TraveledExceedsBudget {
        vehicle: String,
        traveled: f64,
        budget: f64,
    },
    #[error("Vehicle {vehicle} has an invalid distance traveled {traveled}")]
    NegativeDistanceTraveled { vehicle: String, traveled: f64 },
    #[error("Unknown vehicle {0}")]
    UnknownVehicle(String),
    #[error("Unknown target {0}")]
    UnknownTarget(String),
    #[error("Invalid route for vehicle {vehicle}: {reason}")]
    InvalidRoute { vehicle: String, reason: String },
    #[error("Failed to build solver thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
