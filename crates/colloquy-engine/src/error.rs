use colloquy_core::errors::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Rejected before any state mutation; a run never starts.
    #[error("invalid run request: {0}")]
    Validation(String),

    /// At most one run may be active; starts are rejected, never queued.
    #[error("a conversation run is already active")]
    AlreadyRunning,

    /// Hard transport failure from the agent backend; aborts the run.
    #[error("agent call failed: {0}")]
    Client(#[from] ClientError),
}
