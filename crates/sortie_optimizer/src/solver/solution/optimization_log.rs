use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Change applied by the post-optimizer, with the distances that justified it.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizationEvent {
    /// Target moved to a vehicle whose trajectory passes closer to it.
    Migration {
        target: String,
        from_vehicle: String,
        to_vehicle: String,
        ssd: f64,
        osd: f64,
        savings: f64,
    },
    /// Target visited by no route inserted where it costs the least fuel.
    Insertion {
        target: String,
        vehicle: String,
        position: usize,
        marginal_cost: f64,
    },
    /// Waypoints `from..=to` reversed to remove a self crossing.
    Uncross {
        vehicle: String,
        from: usize,
        to: usize,
        distance_before: f64,
        distance_after: f64,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OptimizationLog {
    events: Vec<OptimizationEvent>,
}

impl OptimizationLog {
    pub fn push(&mut self, event: OptimizationEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[OptimizationEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn migrations(&self) -> impl Iterator<Item = &OptimizationEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, OptimizationEvent::Migration { .. }))
    }

    pub fn insertions(&self) -> impl Iterator<Item = &OptimizationEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, OptimizationEvent::Insertion { .. }))
    }

    pub fn uncrossings(&self) -> impl Iterator<Item = &OptimizationEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, OptimizationEvent::Uncross { .. }))
    }

    pub fn into_events(self) -> Vec<OptimizationEvent> {
        self.events
    }
}
