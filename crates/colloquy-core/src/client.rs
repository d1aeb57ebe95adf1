use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ClientError;
use crate::ids::AgentId;

/// Text recorded for an agent turn when the backend returns no reply
/// fragments. A literal placeholder, not an error.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "[no response]";

/// One reply fragment from the agent backend. The backend may return
/// several; only the first one's text enters the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
}

impl AgentReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Roster entry served by the agent backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AgentRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: AgentId::from_raw(id),
            name: name.into(),
            description: None,
        }
    }
}

/// Text of the first reply fragment, or the placeholder when the backend
/// returned nothing usable.
pub fn reply_text(replies: &[AgentReply]) -> String {
    match replies.first() {
        Some(reply) if !reply.text.is_empty() => reply.text.clone(),
        _ => EMPTY_REPLY_PLACEHOLDER.to_string(),
    }
}

/// Message-generation side of the external agent backend.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn send_message(
        &self,
        agent_id: &AgentId,
        text: &str,
    ) -> Result<Vec<AgentReply>, ClientError>;
}

/// Roster side of the external agent backend, polled periodically.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<AgentRecord>, ClientError>;
}
