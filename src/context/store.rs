//! Conversation history storage
//!
//! Holds the ordered Turns of one session. Turns are immutable once appended;
//! the only removal path is FIFO pruning of the oldest entries.

use crate::error::AdvisorError;
use crate::models::Turn;
use crate::Result;
use std::collections::VecDeque;
use tracing::debug;

/// Ordered conversation history for a single session.
///
/// Sequence numbers are strictly increasing for the lifetime of the store,
/// surviving pruning, so a Turn's identity is stable even after older Turns
/// have been dropped.
#[derive(Debug, Clone)]
pub struct ContextStore {
    turns: VecDeque<Turn>,
    /// Prune target: after an append the store trims back to this many turns.
    max_size: usize,
    /// Absolute ceiling; pruning always frees room below it.
    hard_cap: usize,
    next_sequence: u64,
}

impl ContextStore {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            turns: VecDeque::new(),
            max_size,
            hard_cap: max_size.saturating_mul(4),
            next_sequence: 0,
        }
    }

    /// Append a turn, assigning the next sequence number. Automatically
    /// prunes once the history exceeds the configured window.
    pub fn append(&mut self, mut turn: Turn) -> Result<u64> {
        if self.turns.len() >= self.hard_cap {
            self.prune(self.max_size);
            if self.turns.len() >= self.hard_cap {
                return Err(AdvisorError::CapacityError(format!(
                    "history at hard cap of {} turns",
                    self.hard_cap
                )));
            }
        }

        turn.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.turns.push_back(turn);

        if self.turns.len() > self.max_size {
            self.prune(self.max_size);
        }

        Ok(self.next_sequence - 1)
    }

    /// The last `n` turns (or fewer) in chronological order, as a read-only
    /// view over the store.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Turn> {
        let start = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(start)
    }

    /// Remove oldest turns until the history holds at most `max_size`.
    pub fn prune(&mut self, max_size: usize) {
        let mut removed = 0usize;
        while self.turns.len() > max_size {
            self.turns.pop_front();
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, remaining = self.turns.len(), "Pruned context history");
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Format the most recent `n` turns for inclusion in a prompt.
    pub fn formatted_recent(&self, n: usize) -> String {
        let mut out = String::new();
        for turn in self.recent(n) {
            let speaker = match turn.agent_id {
                Some(agent) => agent.display_name(),
                None => "User",
            };
            // Long agent replies get truncated to keep prompts bounded.
            let text = if turn.text.len() > 500 {
                let mut end = 497;
                while !turn.text.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &turn.text[..end])
            } else {
                turn.text.clone()
            };
            out.push_str(&format!("{}: {}\n\n", speaker, text));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentId, TurnRole};

    fn store_with(n: usize, max: usize) -> ContextStore {
        let mut store = ContextStore::new(max);
        for i in 0..n {
            store.append(Turn::user(format!("turn {}", i))).unwrap();
        }
        store
    }

    #[test]
    fn test_recent_returns_chronological_tail() {
        let store = store_with(7, 50);

        let texts: Vec<_> = store.recent(3).map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["turn 4", "turn 5", "turn 6"]);

        // Asking for more than exists returns everything, still in order.
        assert_eq!(store.recent(100).count(), 7);
    }

    #[test]
    fn test_sequence_numbers_strictly_increase() {
        let mut store = ContextStore::new(3);
        let mut last = None;
        for i in 0..20 {
            let seq = store.append(Turn::user(format!("q{}", i))).unwrap();
            if let Some(prev) = last {
                assert!(seq > prev);
            }
            last = Some(seq);
        }
    }

    #[test]
    fn test_prune_is_fifo() {
        let store = store_with(10, 4);

        assert_eq!(store.len(), 4);
        let sequences: Vec<_> = store.recent(10).map(|t| t.sequence).collect();
        // Survivors are the newest turns and their relative order is intact.
        assert_eq!(sequences, vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_append_never_hits_capacity_with_auto_prune() {
        let mut store = ContextStore::new(2);
        for i in 0..100 {
            assert!(store.append(Turn::user(format!("q{}", i))).is_ok());
        }
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_agent_turn_attribution() {
        let mut store = ContextStore::new(10);
        store.append(Turn::user("save for a house")).unwrap();
        store
            .append(Turn::agent(AgentId::GoalPlanning, "Created your goal."))
            .unwrap();

        let turns: Vec<_> = store.recent(2).collect();
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].agent_id, Some(AgentId::GoalPlanning));
    }

    #[test]
    fn test_formatted_recent_labels_speakers() {
        let mut store = ContextStore::new(10);
        store.append(Turn::user("what is an ETF?")).unwrap();
        store
            .append(Turn::agent(AgentId::Education, "An ETF is a fund..."))
            .unwrap();

        let formatted = store.formatted_recent(5);
        assert!(formatted.contains("User: what is an ETF?"));
        assert!(formatted.contains("Education: An ETF is a fund..."));
    }
}
