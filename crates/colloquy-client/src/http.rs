use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use colloquy_core::client::{AgentClient, AgentRecord, AgentRegistry, AgentReply};
use colloquy_core::errors::ClientError;
use colloquy_core::ids::AgentId;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Roster payload shape served by the agent backend.
#[derive(Debug, Deserialize)]
struct AgentsResponse {
    agents: Vec<AgentRecord>,
}

/// HTTP implementation of both collaborator contracts:
/// `POST {base}/agents/{id}/message` and `GET {base}/agents`.
pub struct HttpAgentClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout(self.request_timeout)
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn send_message(
        &self,
        agent_id: &AgentId,
        text: &str,
    ) -> Result<Vec<AgentReply>, ClientError> {
        let url = self.endpoint(&format!("agents/{agent_id}/message"));
        debug!(agent_id = %agent_id, chars = text.len(), "dispatching message");

        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status.as_u16(), body));
        }

        response
            .json::<Vec<AgentReply>>()
            .await
            .map_err(|e| ClientError::MalformedReply(e.to_string()))
    }
}

#[async_trait]
impl AgentRegistry for HttpAgentClient {
    async fn list_agents(&self) -> Result<Vec<AgentRecord>, ClientError> {
        let url = self.endpoint("agents");

        let response = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status.as_u16(), body));
        }

        let roster = response
            .json::<AgentsResponse>()
            .await
            .map_err(|e| ClientError::MalformedReply(e.to_string()))?;
        Ok(roster.agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        let client = HttpAgentClient::new("http://localhost:3000/").unwrap();
        assert_eq!(
            client.endpoint("agents"),
            "http://localhost:3000/agents"
        );
        assert_eq!(
            client.endpoint("/agents/abc/message"),
            "http://localhost:3000/agents/abc/message"
        );
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = HttpAgentClient::new("http://backend:9090///").unwrap();
        assert_eq!(client.endpoint("agents"), "http://backend:9090/agents");
    }

    #[test]
    fn request_timeout_configurable() {
        let client = HttpAgentClient::new("http://localhost:3000")
            .unwrap()
            .with_request_timeout(Duration::from_secs(5));
        assert_eq!(client.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn roster_payload_shape() {
        let json = r#"{"agents": [{"id": "a-1", "name": "Alpha"}, {"id": "b-2", "name": "Beta", "description": "second"}]}"#;
        let parsed: AgentsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.agents.len(), 2);
        assert_eq!(parsed.agents[0].name, "Alpha");
        assert_eq!(parsed.agents[1].description.as_deref(), Some("second"));
    }
}
