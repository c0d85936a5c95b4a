use fxhash::FxHashSet;
use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::{
    define_index_newtype,
    problem::waypoint::{Waypoint, WaypointIdx},
    solver::solution::route::Route,
};

define_index_newtype!(VehicleIdx, Vehicle, Route, Vec<WaypointIdx>);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum StartPoint {
    Base(String),
    Coordinate(Coord),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum EndPoint {
    Base(String),
    Coordinate(Coord),
    /// Any base of the mission, the solver picks the best one.
    Flexible,
    ReturnToStart,
}

/// Inclusive priority bounds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriorityFilter {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl PriorityFilter {
    pub fn at_least(min: u32) -> Self {
        PriorityFilter {
            min: Some(min),
            max: None,
        }
    }

    pub fn accepts(&self, priority: u32) -> bool {
        self.min.is_none_or(|min| priority >= min) && self.max.is_none_or(|max| priority <= max)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VehicleConfig {
    id: String,
    enabled: bool,
    fuel_budget: f64,
    start: StartPoint,
    end: EndPoint,
    allowed_target_types: Option<FxHashSet<String>>,
    excluded_targets: FxHashSet<String>,
    priority_filter: Option<PriorityFilter>,
}

impl VehicleConfig {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn fuel_budget(&self) -> f64 {
        self.fuel_budget
    }

    pub fn start(&self) -> &StartPoint {
        &self.start
    }

    pub fn end(&self) -> &EndPoint {
        &self.end
    }

    pub fn allowed_target_types(&self) -> Option<&FxHashSet<String>> {
        self.allowed_target_types.as_ref()
    }

    pub fn excluded_targets(&self) -> &FxHashSet<String> {
        &self.excluded_targets
    }

    pub fn priority_filter(&self) -> Option<&PriorityFilter> {
        self.priority_filter.as_ref()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_fuel_budget(&mut self, fuel_budget: f64) {
        self.fuel_budget = fuel_budget;
    }

    pub fn set_start(&mut self, start: StartPoint) {
        self.start = start;
    }

    pub fn set_end(&mut self, end: EndPoint) {
        self.end = end;
    }

    /// Static accessibility rules: target type, exclusions and the per vehicle
    /// priority filter.
    pub fn can_access(&self, target: &Waypoint) -> bool {
        if !target.is_target() || self.excluded_targets.contains(target.id()) {
            return false;
        }

        if let Some(allowed) = &self.allowed_target_types {
            match target.target_type() {
                Some(target_type) if allowed.contains(target_type) => {}
                _ => return false,
            }
        }

        self.priority_filter
            .is_none_or(|filter| filter.accepts(target.priority()))
    }
}

pub struct VehicleConfigBuilder {
    id: String,
    fuel_budget: f64,
    start: StartPoint,
    end: EndPoint,
    enabled: Option<bool>,
    allowed_target_types: Option<Vec<String>>,
    excluded_targets: Option<Vec<String>>,
    priority_filter: Option<PriorityFilter>,
}

impl VehicleConfigBuilder {
    pub fn new(id: impl Into<String>, fuel_budget: f64, start: StartPoint, end: EndPoint) -> Self {
        VehicleConfigBuilder {
            id: id.into(),
            fuel_budget,
            start,
            end,
            enabled: None,
            allowed_target_types: None,
            excluded_targets: None,
            priority_filter: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut VehicleConfigBuilder {
        self.enabled = Some(enabled);
        self
    }

    pub fn set_allowed_target_types(&mut self, types: Vec<String>) -> &mut VehicleConfigBuilder {
        self.allowed_target_types = Some(types);
        self
    }

    pub fn set_excluded_targets(&mut self, targets: Vec<String>) -> &mut VehicleConfigBuilder {
        self.excluded_targets = Some(targets);
        self
    }

    pub fn set_priority_filter(&mut self, filter: PriorityFilter) -> &mut VehicleConfigBuilder {
        self.priority_filter = Some(filter);
        self
    }

    pub fn build(self) -> VehicleConfig {
        VehicleConfig {
            id: self.id,
            enabled: self.enabled.unwrap_or(true),
            fuel_budget: self.fuel_budget,
            start: self.start,
            end: self.end,
            allowed_target_types: self
                .allowed_target_types
                .map(|types| types.into_iter().collect()),
            excluded_targets: self
                .excluded_targets
                .unwrap_or_default()
                .into_iter()
                .collect(),
            priority_filter: self.priority_filter,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleEnd {
    Fixed(WaypointIdx),
    AnyBase,
}

/// Vehicle with its start and end resolved to waypoints of the problem.
#[derive(Serialize, Debug, Clone)]
pub struct Vehicle {
    config: VehicleConfig,
    start: WaypointIdx,
    end: VehicleEnd,
}

impl Vehicle {
    pub(crate) fn new(config: VehicleConfig, start: WaypointIdx, end: VehicleEnd) -> Self {
        Vehicle { config, start, end }
    }

    pub fn id(&self) -> &str {
        self.config.id()
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled()
    }

    pub fn fuel_budget(&self) -> f64 {
        self.config.fuel_budget()
    }

    pub fn start(&self) -> WaypointIdx {
        self.start
    }

    pub fn end(&self) -> VehicleEnd {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use geo::coord;

    use super::*;

    fn target(id: &str, priority: Option<u32>, target_type: Option<&str>) -> Waypoint {
        Waypoint::target(
            id,
            coord! { x: 0.0, y: 0.0 },
            priority,
            target_type.map(str::to_owned),
        )
    }

    #[test]
    fn test_priority_filter() {
        let filter = PriorityFilter {
            min: Some(3),
            max: Some(5),
        };

        assert!(!filter.accepts(2));
        assert!(filter.accepts(3));
        assert!(filter.accepts(5));
        assert!(!filter.accepts(6));
        assert!(PriorityFilter::default().accepts(0));
    }

    #[test]
    fn test_can_access() {
        let mut builder = VehicleConfigBuilder::new(
            "D1",
            100.0,
            StartPoint::Base("A1".to_owned()),
            EndPoint::ReturnToStart,
        );
        builder
            .set_allowed_target_types(vec!["radar".to_owned()])
            .set_excluded_targets(vec!["T3".to_owned()])
            .set_priority_filter(PriorityFilter::at_least(2));
        let config = builder.build();

        assert!(config.enabled());
        assert!(config.can_access(&target("T1", Some(2), Some("radar"))));
        assert!(!config.can_access(&target("T2", Some(2), Some("bridge"))));
        assert!(!config.can_access(&target("T3", Some(2), Some("radar"))));
        assert!(!config.can_access(&target("T4", None, Some("radar"))));
        assert!(!config.can_access(&target("T5", Some(4), None)));
    }
}
