use fxhash::FxHashSet;
use geo::Coord;
use serde::{Deserialize, Serialize};
use sortie_matrix::ThreatZone;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Base {
    pub id: String,
    pub coordinate: Coord,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Target {
    pub id: String,
    pub coordinate: Coord,
    pub priority: Option<u32>,
    pub target_type: Option<String>,
}

/// Static description of the theatre: bases, targets and threat zones.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Environment {
    pub bases: Vec<Base>,
    pub targets: Vec<Target>,
    pub threat_zones: Vec<ThreatZone>,
}

impl Environment {
    pub fn base(&self, id: &str) -> Option<&Base> {
        self.bases.iter().find(|base| base.id == id)
    }

    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|target| target.id == id)
    }

    /// Same environment with the given targets removed.
    pub fn without_targets(&self, removed: &FxHashSet<&str>) -> Environment {
        Environment {
            bases: self.bases.clone(),
            targets: self
                .targets
                .iter()
                .filter(|target| !removed.contains(target.id.as_str()))
                .cloned()
                .collect(),
            threat_zones: self.threat_zones.clone(),
        }
    }
}
