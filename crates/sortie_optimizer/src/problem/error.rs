use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("No vehicles in mission")]
    NoVehicles,
    #[error("Duplicate waypoint id {0}")]
    DuplicateWaypoint(String),
    #[error("Duplicate vehicle id {0}")]
    DuplicateVehicle(String),
    #[error("Vehicle {vehicle} references unknown base {base}")]
    UnknownBase { vehicle: String, base: String },
    #[error("Vehicle {vehicle} has an invalid fuel budget {budget}")]
    InvalidFuelBudget { vehicle: String, budget: f64 },
    #[error("Vehicle {0} has a flexible end but the mission has no bases")]
    NoBases(String),
    #[error("Waypoint {0} has an invalid coordinate")]
    InvalidCoordinate(String),
    #[error("Threat zone {0} has an invalid radius")]
    InvalidThreatZone(usize),
}
