use serde::{Deserialize, Serialize};

use crate::ids::RunId;
use crate::state::ConversationTurn;

/// Run life-cycle events emitted while a relay conversation executes.
/// Terminal events are tagged so subscribers can tell "ended normally",
/// "ended by request", and "ended due to failure" apart.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayEvent {
    #[serde(rename = "run_started")]
    RunStarted {
        run_id: RunId,
        selected_agents: Vec<String>,
        max_turns: u32,
    },

    #[serde(rename = "turn_recorded")]
    TurnRecorded { run_id: RunId, turn: ConversationTurn },

    /// Soft failure: the selected agent had no roster mapping for this pair.
    #[serde(rename = "agent_skipped")]
    AgentSkipped {
        run_id: RunId,
        agent: String,
        pass: u32,
    },

    #[serde(rename = "run_completed")]
    RunCompleted { run_id: RunId, turn_count: u32 },

    #[serde(rename = "run_stopped")]
    RunStopped { run_id: RunId, turn_count: u32 },

    #[serde(rename = "run_failed")]
    RunFailed {
        run_id: RunId,
        error_kind: String,
        message: String,
    },
}

impl RelayEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::TurnRecorded { run_id, .. }
            | Self::AgentSkipped { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::RunStopped { run_id, .. }
            | Self::RunFailed { run_id, .. } => run_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::TurnRecorded { .. } => "turn_recorded",
            Self::AgentSkipped { .. } => "agent_skipped",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunStopped { .. } => "run_stopped",
            Self::RunFailed { .. } => "run_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. } | Self::RunStopped { .. } | Self::RunFailed { .. }
        )
    }
}
