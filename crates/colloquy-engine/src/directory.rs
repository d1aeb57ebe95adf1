use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use colloquy_core::client::{AgentRecord, AgentRegistry};
use colloquy_core::ids::AgentId;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of resolving a selected agent name against a roster snapshot.
/// Unresolved is a soft result: the caller skips the pair, never aborts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(AgentId),
    Unresolved,
}

impl Resolution {
    pub fn into_id(self) -> Option<AgentId> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::Unresolved => None,
        }
    }
}

/// A selected agent as seen through the current roster snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub resolved_id: Option<AgentId>,
    pub description: Option<String>,
}

/// Immutable name→id view of one roster refresh. The exact map is consulted
/// before the case-folded one, so a case-sensitive match always wins.
#[derive(Debug, Default)]
pub struct DirectorySnapshot {
    exact: HashMap<String, AgentId>,
    folded: HashMap<String, AgentId>,
    descriptions: HashMap<String, String>,
}

impl DirectorySnapshot {
    fn from_roster(roster: &[AgentRecord]) -> Self {
        let mut snapshot = Self::default();
        for record in roster {
            if record.name.is_empty() || record.id.as_str().is_empty() {
                debug!(name = %record.name, "dropping roster entry without usable name/id");
                continue;
            }
            // First occurrence wins so identical rosters always fold the same way.
            snapshot
                .exact
                .entry(record.name.clone())
                .or_insert_with(|| record.id.clone());
            snapshot
                .folded
                .entry(record.name.to_lowercase())
                .or_insert_with(|| record.id.clone());
            if let Some(description) = &record.description {
                snapshot
                    .descriptions
                    .entry(record.name.clone())
                    .or_insert_with(|| description.clone());
            }
        }
        snapshot
    }

    /// Two-pass lookup: exact case-sensitive match first, else
    /// case-insensitive, else Unresolved.
    pub fn resolve(&self, name: &str) -> Resolution {
        if let Some(id) = self.exact.get(name) {
            return Resolution::Resolved(id.clone());
        }
        match self.folded.get(&name.to_lowercase()) {
            Some(id) => Resolution::Resolved(id.clone()),
            None => Resolution::Unresolved,
        }
    }

    pub fn descriptor(&self, name: &str) -> AgentDescriptor {
        AgentDescriptor {
            name: name.to_string(),
            resolved_id: self.resolve(name).into_id(),
            description: self.descriptions.get(name).cloned(),
        }
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

/// Name→id directory refreshed from the backend roster. Readers take
/// point-in-time snapshots; a stale snapshot at worst causes a skip.
pub struct AgentDirectory {
    snapshot: RwLock<Arc<DirectorySnapshot>>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(DirectorySnapshot::default())),
        }
    }

    /// Rebuild the snapshot from a raw roster. Idempotent: identical input
    /// yields an identical mapping.
    pub fn refresh(&self, roster: &[AgentRecord]) -> Arc<DirectorySnapshot> {
        let next = Arc::new(DirectorySnapshot::from_roster(roster));
        *self.snapshot.write() = Arc::clone(&next);
        next
    }

    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        Arc::clone(&self.snapshot.read())
    }
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll the registry on a fixed cadence and refresh the directory until the
/// token fires. Runs independently of any active conversation run.
pub fn spawn_refresh_task(
    directory: Arc<AgentDirectory>,
    registry: Arc<dyn AgentRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match registry.list_agents().await {
                        Ok(roster) => {
                            let snapshot = directory.refresh(&roster);
                            debug!(agents = snapshot.len(), "roster refreshed");
                        }
                        Err(e) => {
                            warn!(error = %e, kind = e.error_kind(), "roster refresh failed");
                        }
                    }
                }
            }
        }
    })
}
