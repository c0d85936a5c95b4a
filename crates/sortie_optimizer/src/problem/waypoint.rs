use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::define_index_newtype;

define_index_newtype!(WaypointIdx, Waypoint);

/// Priority of a target without an explicit one.
pub const DEFAULT_PRIORITY: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    Base,
    Target,
    /// Coordinate start or end of a vehicle, including checkpoint positions.
    Synthetic,
}

#[derive(Serialize, Debug, Clone)]
pub struct Waypoint {
    id: String,
    coordinate: Coord,
    kind: WaypointKind,
    priority: Option<u32>,
    target_type: Option<String>,
}

impl Waypoint {
    pub fn base(id: impl Into<String>, coordinate: Coord) -> Self {
        Waypoint {
            id: id.into(),
            coordinate,
            kind: WaypointKind::Base,
            priority: None,
            target_type: None,
        }
    }

    pub fn target(
        id: impl Into<String>,
        coordinate: Coord,
        priority: Option<u32>,
        target_type: Option<String>,
    ) -> Self {
        Waypoint {
            id: id.into(),
            coordinate,
            kind: WaypointKind::Target,
            priority,
            target_type,
        }
    }

    pub fn synthetic(id: impl Into<String>, coordinate: Coord) -> Self {
        Waypoint {
            id: id.into(),
            coordinate,
            kind: WaypointKind::Synthetic,
            priority: None,
            target_type: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn coordinate(&self) -> Coord {
        self.coordinate
    }

    pub fn kind(&self) -> WaypointKind {
        self.kind
    }

    pub fn is_target(&self) -> bool {
        self.kind == WaypointKind::Target
    }

    /// Anything that is not a target can start or end a route.
    pub fn is_anchor(&self) -> bool {
        !self.is_target()
    }

    /// Collected score when visiting the waypoint, zero for anchors.
    pub fn priority(&self) -> u32 {
        if self.is_target() {
            self.priority.unwrap_or(DEFAULT_PRIORITY)
        } else {
            0
        }
    }

    pub fn explicit_priority(&self) -> Option<u32> {
        self.priority
    }

    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use geo::coord;

    use super::*;

    #[test]
    fn test_priority_defaults() {
        let target = Waypoint::target("T1", coord! { x: 1.0, y: 2.0 }, None, None);
        let valued = Waypoint::target("T2", coord! { x: 1.0, y: 2.0 }, Some(5), None);
        let base = Waypoint::base("A1", coord! { x: 0.0, y: 0.0 });

        assert_eq!(target.priority(), DEFAULT_PRIORITY);
        assert_eq!(valued.priority(), 5);
        assert_eq!(base.priority(), 0);
        assert!(base.is_anchor());
        assert!(!target.is_anchor());
    }
}
