use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use colloquy_core::client::{reply_text, AgentClient};
use colloquy_core::events::RelayEvent;
use colloquy_core::ids::RunId;
use colloquy_core::state::{ConversationState, ConversationTurn, RunRequest};

use crate::directory::{AgentDirectory, Resolution};
use crate::error::EngineError;
use crate::scheduler::TurnScheduler;

pub const DEFAULT_TURN_DELAY: Duration = Duration::from_millis(1000);

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Pacing delay applied after each completed agent turn.
    pub turn_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            turn_delay: DEFAULT_TURN_DELAY,
        }
    }
}

/// How a run ended when it did not abort with an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The schedule was exhausted.
    Completed { turn_count: u32 },
    /// Cancellation was observed at a pair boundary.
    Stopped { turn_count: u32 },
}

impl RunOutcome {
    pub fn turn_count(&self) -> u32 {
        match self {
            Self::Completed { turn_count } | Self::Stopped { turn_count } => *turn_count,
        }
    }
}

/// Executes one relay conversation: walks the schedule, feeds each agent the
/// previous turn's text verbatim, and records every completed response.
///
/// The runner owns the only mutable copy of the conversation state; observers
/// see immutable snapshots through the watch channel after every append.
pub struct RelayRunner {
    client: Arc<dyn AgentClient>,
    directory: Arc<AgentDirectory>,
    config: RunnerConfig,
    event_tx: broadcast::Sender<RelayEvent>,
    state_tx: Arc<watch::Sender<ConversationState>>,
}

impl RelayRunner {
    pub fn new(
        client: Arc<dyn AgentClient>,
        directory: Arc<AgentDirectory>,
        config: RunnerConfig,
        event_tx: broadcast::Sender<RelayEvent>,
        state_tx: Arc<watch::Sender<ConversationState>>,
    ) -> Self {
        Self {
            client,
            directory,
            config,
            event_tx,
            state_tx,
        }
    }

    fn send_event(&self, event: RelayEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("no event receivers, relay event dropped");
        }
    }

    fn publish(&self, state: &ConversationState) {
        self.state_tx.send_replace(state.clone());
    }

    /// Drive the relay to completion, stop, or hard abort.
    ///
    /// Cancellation is honored at pair boundaries only: an in-flight agent
    /// call always finishes and its turn is recorded before the stop lands.
    #[instrument(skip(self, request, cancel), fields(run_id = %run_id))]
    pub async fn run(
        &self,
        request: RunRequest,
        run_id: RunId,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let mut state =
            ConversationState::new(request.selected_agents.clone(), request.max_turns)
                .with_running(true);
        self.publish(&state);

        let scheduler = TurnScheduler::new(request.selected_agents.clone(), request.max_turns);
        let mut seeded = false;

        for pair in scheduler {
            if cancel.is_cancelled() {
                info!(turn_count = state.turn_count, "run stopped by request");
                state = state.with_running(false);
                self.publish(&state);
                return Ok(RunOutcome::Stopped {
                    turn_count: state.turn_count,
                });
            }

            let snapshot = self.directory.snapshot();
            let agent_id = match snapshot.resolve(&pair.agent) {
                Resolution::Resolved(id) => id,
                Resolution::Unresolved => {
                    warn!(agent = %pair.agent, pass = pair.pass, "agent not in roster, skipping");
                    self.send_event(RelayEvent::AgentSkipped {
                        run_id: run_id.clone(),
                        agent: pair.agent.clone(),
                        pass: pair.pass,
                    });
                    continue;
                }
            };

            // The user's opening message becomes the first recorded turn the
            // moment the first resolvable agent is about to be addressed.
            if !seeded {
                let turn =
                    ConversationTurn::user(request.initial_message.clone(), state.next_sequence());
                state = state.with_turn(turn.clone());
                self.publish(&state);
                self.send_event(RelayEvent::TurnRecorded {
                    run_id: run_id.clone(),
                    turn,
                });
                seeded = true;
            }

            let input = state
                .last_text()
                .unwrap_or(request.initial_message.as_str())
                .to_string();

            let replies = match self.client.send_message(&agent_id, &input).await {
                Ok(replies) => replies,
                Err(e) => {
                    warn!(agent = %pair.agent, error = %e, kind = e.error_kind(), "agent call failed, aborting run");
                    state = state.with_running(false);
                    self.publish(&state);
                    return Err(EngineError::Client(e));
                }
            };

            let text = reply_text(&replies);
            let turn = ConversationTurn::agent(pair.agent.clone(), text, state.next_sequence());
            state = state.with_turn(turn.clone());
            self.publish(&state);
            self.send_event(RelayEvent::TurnRecorded {
                run_id: run_id.clone(),
                turn,
            });
            debug!(agent = %pair.agent, pass = pair.pass, turn_count = state.turn_count, "turn recorded");

            tokio::time::sleep(self.config.turn_delay).await;
        }

        info!(turn_count = state.turn_count, "run completed");
        state = state.with_running(false);
        self.publish(&state);
        Ok(RunOutcome::Completed {
            turn_count: state.turn_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use colloquy_client::mock::{MockAgentClient, MockReply};
    use colloquy_core::client::{AgentRecord, EMPTY_REPLY_PLACEHOLDER};
    use colloquy_core::errors::ClientError;
    use colloquy_core::state::Speaker;

    fn request(agents: &[&str], initial: &str, max_turns: u32) -> RunRequest {
        RunRequest {
            selected_agents: agents.iter().map(|s| s.to_string()).collect(),
            initial_message: initial.to_string(),
            max_turns,
        }
    }

    struct Harness {
        mock: Arc<MockAgentClient>,
        runner: RelayRunner,
        state_rx: watch::Receiver<ConversationState>,
        event_rx: broadcast::Receiver<RelayEvent>,
    }

    fn harness(replies: Vec<MockReply>, roster: Vec<AgentRecord>) -> Harness {
        let mock = Arc::new(MockAgentClient::new(replies));
        let directory = Arc::new(AgentDirectory::new());
        directory.refresh(&roster);
        let (event_tx, event_rx) = broadcast::channel(64);
        let (state_tx, state_rx) = watch::channel(ConversationState::empty());
        let runner = RelayRunner::new(
            mock.clone(),
            directory,
            RunnerConfig {
                turn_delay: Duration::from_millis(1),
            },
            event_tx,
            Arc::new(state_tx),
        );
        Harness {
            mock,
            runner,
            state_rx,
            event_rx,
        }
    }

    fn drain_events(rx: &mut broadcast::Receiver<RelayEvent>) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = rx.try_recv() {
            events.push(evt);
        }
        events
    }

    #[tokio::test]
    async fn relay_chains_each_reply_into_the_next_call() {
        let h = harness(
            vec![MockReply::text("alpha says"), MockReply::text("beta says")],
            vec![AgentRecord::new("id-a", "Alpha"), AgentRecord::new("id-b", "Beta")],
        );

        let outcome = h
            .runner
            .run(request(&["Alpha", "Beta"], "kick off", 1), RunId::new(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed { turn_count: 2 });
        let sent = h.mock.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, "kick off");
        assert_eq!(sent[1].1, "alpha says");

        let state = h.state_rx.borrow().clone();
        assert!(!state.running);
        assert_eq!(state.turn_count, 2);
        assert_eq!(state.turns.len(), 3);
        assert_eq!(state.turns[0].speaker, Speaker::User);
        assert_eq!(state.turns[1].speaker, Speaker::agent("Alpha"));
        assert_eq!(state.turns[2].text, "beta says");
    }

    #[tokio::test]
    async fn unresolved_agents_are_skipped_without_aborting() {
        let mut h = harness(
            vec![MockReply::text("a1"), MockReply::text("a2")],
            vec![AgentRecord::new("id-a", "Alpha")],
        );

        let outcome = h
            .runner
            .run(request(&["Alpha", "Ghost"], "go", 2), RunId::new(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed { turn_count: 2 });
        assert_eq!(h.mock.call_count(), 2);

        let events = drain_events(&mut h.event_rx);
        let skips: Vec<&RelayEvent> = events
            .iter()
            .filter(|e| matches!(e, RelayEvent::AgentSkipped { .. }))
            .collect();
        assert_eq!(skips.len(), 2);
    }

    #[tokio::test]
    async fn all_unresolved_ends_with_zero_turns_and_no_seed() {
        let h = harness(vec![], vec![]);

        let outcome = h
            .runner
            .run(request(&["Ghost", "Phantom"], "go", 3), RunId::new(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed { turn_count: 0 });
        assert_eq!(h.mock.call_count(), 0);
        let state = h.state_rx.borrow().clone();
        assert!(state.turns.is_empty(), "no seed turn without a dispatched pair");
        assert!(!state.running);
    }

    #[tokio::test]
    async fn empty_backend_reply_becomes_placeholder_and_chains() {
        let h = harness(
            vec![MockReply::empty(), MockReply::text("reaction")],
            vec![AgentRecord::new("id-a", "Alpha"), AgentRecord::new("id-b", "Beta")],
        );

        h.runner
            .run(request(&["Alpha", "Beta"], "start", 1), RunId::new(), CancellationToken::new())
            .await
            .unwrap();

        let state = h.state_rx.borrow().clone();
        assert_eq!(state.turns[1].text, EMPTY_REPLY_PLACEHOLDER);
        // The placeholder itself is relayed verbatim.
        assert_eq!(h.mock.sent()[1].1, EMPTY_REPLY_PLACEHOLDER);
    }

    #[tokio::test]
    async fn transport_error_aborts_immediately() {
        let h = harness(
            vec![
                MockReply::text("fine"),
                MockReply::Error(ClientError::Network("tcp reset".into())),
            ],
            vec![AgentRecord::new("id-a", "Alpha"), AgentRecord::new("id-b", "Beta")],
        );

        let err = h
            .runner
            .run(request(&["Alpha", "Beta"], "go", 3), RunId::new(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Client(ClientError::Network(_))));
        // No retry: exactly the two calls that were attempted.
        assert_eq!(h.mock.call_count(), 2);
        let state = h.state_rx.borrow().clone();
        assert!(!state.running);
        assert_eq!(state.turn_count, 1, "the failed pair records no turn");
    }

    #[tokio::test]
    async fn cancellation_lands_at_pair_boundary() {
        let h = harness(
            vec![MockReply::text("only")],
            vec![AgentRecord::new("id-a", "Alpha"), AgentRecord::new("id-b", "Beta")],
        );

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                // Let the first turn complete, then request the stop during
                // the inter-turn delay.
                tokio::time::sleep(Duration::from_micros(500)).await;
                cancel.cancel();
            })
        };

        let outcome = h
            .runner
            .run(request(&["Alpha", "Beta"], "go", 5), RunId::new(), cancel)
            .await
            .unwrap();
        handle.await.unwrap();

        match outcome {
            RunOutcome::Stopped { turn_count } => {
                let state = h.state_rx.borrow().clone();
                assert_eq!(state.turn_count, turn_count);
                assert!(!state.running);
            }
            other => panic!("expected Stopped, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pre_cancelled_run_stops_before_any_dispatch() {
        let h = harness(
            vec![MockReply::text("never")],
            vec![AgentRecord::new("id-a", "Alpha"), AgentRecord::new("id-b", "Beta")],
        );

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = h
            .runner
            .run(request(&["Alpha", "Beta"], "go", 2), RunId::new(), cancel)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Stopped { turn_count: 0 });
        assert_eq!(h.mock.call_count(), 0);
        assert!(h.state_rx.borrow().turns.is_empty());
    }

    #[tokio::test]
    async fn sequence_numbers_stay_gap_free_across_skips() {
        let h = harness(
            vec![
                MockReply::text("t1"),
                MockReply::text("t2"),
                MockReply::text("t3"),
                MockReply::text("t4"),
            ],
            vec![AgentRecord::new("id-a", "Alpha"), AgentRecord::new("id-b", "Beta")],
        );

        h.runner
            .run(
                request(&["Alpha", "Ghost", "Beta"], "go", 2),
                RunId::new(),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let state = h.state_rx.borrow().clone();
        let sequences: Vec<u64> = state.turns.iter().map(|t| t.sequence).collect();
        let expected: Vec<u64> = (0..state.turns.len() as u64).collect();
        assert_eq!(sequences, expected);
    }
}
