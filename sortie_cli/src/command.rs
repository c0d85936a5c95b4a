use serde::{Deserialize, Serialize};
use sortie_optimizer::json::types::{JsonCheckpoint, JsonMissionRequest, JsonSolverParams};
use uuid::Uuid;

/// Structured operation on the mission store, the only way missions are solved
/// or changed.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MissionCommand {
    Solve {
        request: JsonMissionRequest,
    },
    /// Post-optimizes the stored routes again, optionally with other parameters.
    Optimize {
        mission_id: Uuid,
        params: Option<JsonSolverParams>,
    },
    /// Creates a new mission for what is left after `checkpoint`.
    Replan {
        mission_id: Uuid,
        checkpoint: JsonCheckpoint,
    },
    List,
    Show {
        mission_id: Uuid,
    },
}

impl MissionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            MissionCommand::Solve { .. } => "solve",
            MissionCommand::Optimize { .. } => "optimize",
            MissionCommand::Replan { .. } => "replan",
            MissionCommand::List => "list",
            MissionCommand::Show { .. } => "show",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_commands() {
        let id = Uuid::new_v4();

        let show: MissionCommand =
            serde_json::from_str(&format!(r#"{{ "command": "show", "mission_id": "{id}" }}"#))
                .unwrap();
        assert!(matches!(show, MissionCommand::Show { mission_id } if mission_id == id));

        let optimize: MissionCommand = serde_json::from_str(&format!(
            r#"{{ "command": "optimize", "mission_id": "{id}" }}"#
        ))
        .unwrap();
        assert!(matches!(optimize, MissionCommand::Optimize { params: None, .. }));
        assert_eq!(optimize.name(), "optimize");

        let list: MissionCommand = serde_json::from_str(r#"{ "command": "list" }"#).unwrap();
        assert!(matches!(list, MissionCommand::List));

        assert!(serde_json::from_str::<MissionCommand>(r#"{ "command": "fly" }"#).is_err());
    }
}
