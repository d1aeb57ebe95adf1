use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use colloquy_core::client::{AgentClient, AgentRecord, AgentRegistry, AgentReply};
use colloquy_core::errors::ClientError;
use colloquy_core::ids::AgentId;

/// Pre-programmed replies for deterministic testing without a backend.
pub enum MockReply {
    /// Return these reply fragments.
    Replies(Vec<AgentReply>),
    /// Fail the call.
    Error(ClientError),
    /// Wait a duration, then yield the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    /// Convenience: a single-fragment text reply.
    pub fn text(text: &str) -> Self {
        Self::Replies(vec![AgentReply::text(text)])
    }

    /// Convenience: a reply with no fragments at all.
    pub fn empty() -> Self {
        Self::Replies(Vec::new())
    }

    /// Convenience: wrap any reply with a delay.
    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock client that serves pre-programmed replies in sequence and records
/// every outbound message so tests can assert relay chaining.
pub struct MockAgentClient {
    replies: Mutex<VecDeque<MockReply>>,
    sent: Mutex<Vec<(AgentId, String)>>,
    call_count: AtomicUsize,
}

impl MockAgentClient {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Every `(agent_id, text)` pair dispatched so far, in order.
    pub fn sent(&self) -> Vec<(AgentId, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn send_message(
        &self,
        agent_id: &AgentId,
        text: &str,
    ) -> Result<Vec<AgentReply>, ClientError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.sent.lock().push((agent_id.clone(), text.to_string()));

        let reply = self.replies.lock().pop_front().ok_or_else(|| {
            ClientError::InvalidRequest(format!("MockAgentClient: no reply configured for call {idx}"))
        })?;

        resolve_reply(reply).await
    }
}

/// Resolve a MockReply, handling Delay by sleeping first.
/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_reply(reply: MockReply) -> Result<Vec<AgentReply>, ClientError> {
    let mut current = reply;
    loop {
        match current {
            MockReply::Replies(replies) => return Ok(replies),
            MockReply::Error(e) => return Err(e),
            MockReply::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}

/// Mock registry serving a fixed (replaceable) roster.
pub struct MockRegistry {
    roster: Mutex<Vec<AgentRecord>>,
    call_count: AtomicUsize,
}

impl MockRegistry {
    pub fn new(roster: Vec<AgentRecord>) -> Self {
        Self {
            roster: Mutex::new(roster),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn set_roster(&self, roster: Vec<AgentRecord>) {
        *self.roster.lock() = roster;
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AgentRegistry for MockRegistry {
    async fn list_agents(&self) -> Result<Vec<AgentRecord>, ClientError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.roster.lock().clone())
    }
}
