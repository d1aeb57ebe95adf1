/// One scheduled dispatch: pass index within [0, max_turns) and the agent
/// whose turn it is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledPair {
    pub pass: u32,
    pub agent: String,
}

/// Finite round-robin schedule over the selected agents: every agent once
/// per pass, `max_turns` passes, selection order fixed for the whole run.
///
/// A fresh scheduler is built per run. It assumes the minimum-two-agents
/// precondition was already validated by the caller.
pub struct TurnScheduler {
    agents: Vec<String>,
    max_turns: u32,
    next: usize,
}

impl TurnScheduler {
    pub fn new(agents: Vec<String>, max_turns: u32) -> Self {
        Self {
            agents,
            max_turns,
            next: 0,
        }
    }

    /// Natural bound: `max_turns * agents.len()` pairs.
    pub fn total_pairs(&self) -> usize {
        self.agents.len() * self.max_turns as usize
    }
}

impl Iterator for TurnScheduler {
    type Item = ScheduledPair;

    fn next(&mut self) -> Option<ScheduledPair> {
        if self.agents.is_empty() || self.next >= self.total_pairs() {
            return None;
        }
        let pass = (self.next / self.agents.len()) as u32;
        let agent = self.agents[self.next % self.agents.len()].clone();
        self.next += 1;
        Some(ScheduledPair { pass, agent })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_pairs().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TurnScheduler {}
