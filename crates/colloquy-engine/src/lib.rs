pub mod directory;
pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod scheduler;

pub use directory::{spawn_refresh_task, AgentDirectory, DirectorySnapshot, Resolution};
pub use error::EngineError;
pub use orchestrator::ConversationOrchestrator;
pub use runner::{RelayRunner, RunOutcome, RunnerConfig};
pub use scheduler::{ScheduledPair, TurnScheduler};
