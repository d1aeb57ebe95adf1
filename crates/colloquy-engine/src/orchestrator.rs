use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use colloquy_core::client::AgentClient;
use colloquy_core::events::RelayEvent;
use colloquy_core::ids::RunId;
use colloquy_core::state::{ConversationState, RunRequest};

use crate::directory::AgentDirectory;
use crate::error::EngineError;
use crate::runner::{RelayRunner, RunOutcome, RunnerConfig};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct ActiveRun {
    run_id: RunId,
    cancel: CancellationToken,
}

/// Single-run conversation orchestrator.
///
/// Holds at most one active run at a time. `start` validates the request,
/// claims the run slot, and spawns the relay loop onto the runtime; the
/// spawned task emits the terminal event and releases the slot when the loop
/// exits, whichever way it exits.
pub struct ConversationOrchestrator {
    client: Arc<dyn AgentClient>,
    directory: Arc<AgentDirectory>,
    runner_config: RunnerConfig,
    event_tx: broadcast::Sender<RelayEvent>,
    state_tx: Arc<watch::Sender<ConversationState>>,
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl ConversationOrchestrator {
    pub fn new(
        client: Arc<dyn AgentClient>,
        directory: Arc<AgentDirectory>,
        runner_config: RunnerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(ConversationState::empty());
        Self {
            client,
            directory,
            runner_config,
            event_tx,
            state_tx: Arc::new(state_tx),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Validate and launch a run. Returns once the run is spawned; progress
    /// arrives through the event and state channels.
    #[instrument(skip(self, request), fields(agents = request.selected_agents.len(), max_turns = request.max_turns))]
    pub fn start(&self, request: RunRequest) -> Result<RunId, EngineError> {
        if request.selected_agents.len() < 2 {
            return Err(EngineError::Validation(format!(
                "a relay needs at least 2 selected agents, got {}",
                request.selected_agents.len()
            )));
        }
        if request.max_turns == 0 {
            return Err(EngineError::Validation(
                "max_turns must be at least 1".into(),
            ));
        }

        let run_id = RunId::new();
        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(EngineError::AlreadyRunning);
            }
            *active = Some(ActiveRun {
                run_id: run_id.clone(),
                cancel: cancel.clone(),
            });
        }

        info!(run_id = %run_id, "run started");
        self.send_event(RelayEvent::RunStarted {
            run_id: run_id.clone(),
            selected_agents: request.selected_agents.clone(),
            max_turns: request.max_turns,
        });

        let runner = RelayRunner::new(
            Arc::clone(&self.client),
            Arc::clone(&self.directory),
            self.runner_config.clone(),
            self.event_tx.clone(),
            Arc::clone(&self.state_tx),
        );
        let event_tx = self.event_tx.clone();
        let active = Arc::clone(&self.active);
        let task_run_id = run_id.clone();

        tokio::spawn(async move {
            let terminal = match runner.run(request, task_run_id.clone(), cancel).await {
                Ok(RunOutcome::Completed { turn_count }) => RelayEvent::RunCompleted {
                    run_id: task_run_id.clone(),
                    turn_count,
                },
                Ok(RunOutcome::Stopped { turn_count }) => RelayEvent::RunStopped {
                    run_id: task_run_id.clone(),
                    turn_count,
                },
                Err(EngineError::Client(e)) => {
                    error!(run_id = %task_run_id, error = %e, "run aborted");
                    RelayEvent::RunFailed {
                        run_id: task_run_id.clone(),
                        error_kind: e.error_kind().to_string(),
                        message: e.to_string(),
                    }
                }
                Err(e) => {
                    // Validation and slot errors are caught before spawn.
                    error!(run_id = %task_run_id, error = %e, "unexpected run error");
                    RelayEvent::RunFailed {
                        run_id: task_run_id.clone(),
                        error_kind: "internal".to_string(),
                        message: e.to_string(),
                    }
                }
            };

            if event_tx.send(terminal).is_err() {
                warn!("no event receivers, terminal event dropped");
            }
            active.lock().take();
        });

        Ok(run_id)
    }

    /// Request a cooperative stop. Returns false when nothing is running.
    /// The stop lands at the next pair boundary; the in-flight agent call,
    /// if any, completes first.
    pub fn stop(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(run) => {
                info!(run_id = %run.run_id, "stop requested");
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Clear the conversation back to the empty state. Only legal while idle.
    pub fn reset(&self) -> Result<(), EngineError> {
        if self.active.lock().is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        self.state_tx.send_replace(ConversationState::empty());
        info!("conversation reset");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn state(&self) -> ConversationState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConversationState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_tx.subscribe()
    }

    fn send_event(&self, event: RelayEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("no event receivers, relay event dropped");
        }
    }
}
