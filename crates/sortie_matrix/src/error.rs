use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    #[error("Duplicate point id {0}")]
    DuplicatePoint(String),
    #[error("Point {0} has a non finite coordinate")]
    NonFiniteCoordinate(String),
    #[error("Threat zone {index} has an invalid radius {radius}")]
    InvalidZoneRadius { index: usize, radius: f64 },
    #[error("Threat zone {0} has a non finite center")]
    InvalidZoneCenter(usize),
}
