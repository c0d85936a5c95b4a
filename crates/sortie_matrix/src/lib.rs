pub mod cache;
pub mod dijkstra;
pub mod distance_matrix;
pub mod error;
pub mod geometry;
pub mod threat_zone;
pub mod visibility_graph;

pub use distance_matrix::{DistanceMatrix, Leg, MatrixPoint};
pub use error::MatrixError;
pub use threat_zone::ThreatZone;
pub use visibility_graph::MatrixParams;
