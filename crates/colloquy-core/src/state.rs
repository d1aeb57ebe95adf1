use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Speaker {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "agent")]
    Agent { name: String },
}

impl Speaker {
    pub fn agent(name: impl Into<String>) -> Self {
        Speaker::Agent { name: name.into() }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Speaker::User => "User",
            Speaker::Agent { name } => name,
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Speaker::Agent { .. })
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One completed exchange in the relay. Created by the run loop only;
/// immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>, sequence: u64) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            sequence,
            timestamp: Utc::now(),
        }
    }

    pub fn agent(name: impl Into<String>, text: impl Into<String>, sequence: u64) -> Self {
        Self {
            speaker: Speaker::agent(name),
            text: text.into(),
            sequence,
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot of an active (or finished) conversation run.
///
/// Transitions are pure: each returns a new value, the run loop rebinds it,
/// and external readers only ever see clones handed out through a watch
/// channel. That removes any need for locking between the loop and readers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Selection order fixed at run start, never reshuffled mid-run.
    pub selected_agents: Vec<String>,
    pub turns: Vec<ConversationTurn>,
    pub running: bool,
    /// Completed agent responses only; skipped pairs never count.
    pub turn_count: u32,
    pub max_turns: u32,
}

impl ConversationState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fresh state for a validated run request.
    pub fn new(selected_agents: Vec<String>, max_turns: u32) -> Self {
        Self {
            selected_agents,
            turns: Vec::new(),
            running: false,
            turn_count: 0,
            max_turns,
        }
    }

    /// Append a turn. Agent turns bump `turn_count`; the seed user turn does
    /// not.
    pub fn with_turn(mut self, turn: ConversationTurn) -> Self {
        if turn.speaker.is_agent() {
            self.turn_count += 1;
        }
        self.turns.push(turn);
        self
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    /// Next gap-free sequence number.
    pub fn next_sequence(&self) -> u64 {
        self.turns.len() as u64
    }

    /// Text of the most recent turn, i.e. the next relay input.
    pub fn last_text(&self) -> Option<&str> {
        self.turns.last().map(|t| t.text.as_str())
    }
}

/// Transient input to `start`, validated once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRequest {
    pub selected_agents: Vec<String>,
    pub initial_message: String,
    pub max_turns: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_display() {
        assert_eq!(Speaker::User.to_string(), "User");
        assert_eq!(Speaker::agent("Trader").to_string(), "Trader");
        assert!(Speaker::agent("Trader").is_agent());
        assert!(!Speaker::User.is_agent());
    }

    #[test]
    fn empty_state_is_idle() {
        let state = ConversationState::empty();
        assert!(!state.running);
        assert!(state.turns.is_empty());
        assert_eq!(state.turn_count, 0);
        assert_eq!(state.next_sequence(), 0);
        assert!(state.last_text().is_none());
    }

    #[test]
    fn with_turn_counts_agent_responses_only() {
        let state = ConversationState::new(vec!["A".into(), "B".into()], 1)
            .with_turn(ConversationTurn::user("hi", 0))
            .with_turn(ConversationTurn::agent("A", "hello", 1));
        assert_eq!(state.turn_count, 1);
        assert_eq!(state.turns.len(), 2);
        assert_eq!(state.last_text(), Some("hello"));
    }

    #[test]
    fn transitions_do_not_mutate_snapshots() {
        let original = ConversationState::new(vec!["A".into(), "B".into()], 2);
        let snapshot = original.clone();
        let advanced = original
            .with_turn(ConversationTurn::user("hi", 0))
            .with_running(true);
        assert!(snapshot.turns.is_empty());
        assert!(!snapshot.running);
        assert_eq!(advanced.turns.len(), 1);
        assert!(advanced.running);
    }

    #[test]
    fn sequence_numbers_follow_turn_count() {
        let mut state = ConversationState::new(vec!["A".into(), "B".into()], 3);
        for i in 0..5u64 {
            assert_eq!(state.next_sequence(), i);
            state = state.with_turn(ConversationTurn::agent("A", format!("t{i}"), i));
        }
        let sequences: Vec<u64> = state.turns.iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn turn_serde_roundtrip() {
        let turn = ConversationTurn::agent("Oracle", "the answer", 3);
        let json = serde_json::to_string(&turn).unwrap();
        let parsed: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(turn, parsed);
    }

    #[test]
    fn speaker_serde_tagging() {
        let json = serde_json::to_value(Speaker::agent("Echo")).unwrap();
        assert_eq!(json["type"], "agent");
        assert_eq!(json["name"], "Echo");
        let json = serde_json::to_value(Speaker::User).unwrap();
        assert_eq!(json["type"], "user");
    }
}
