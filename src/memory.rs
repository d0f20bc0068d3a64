//! Per-user conversation memory.
//!
//! Sessions live behind the [`SessionStore`] trait so the assistant never
//! touches process-wide state directly. [`InMemorySessionStore`] keeps the
//! last `max_turns` turns per user for the process lifetime; nothing is
//! persisted. The number of users is not capped.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use crate::models::ConversationTurn;

/// History text when a user has no turns yet.
pub const NO_HISTORY: &str = "无";

/// Render turns most-recent-last as `用户：…` / `智能体：…` lines.
pub fn render_history(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return NO_HISTORY.to_string();
    }
    turns
        .iter()
        .map(|t| format!("用户：{}\n智能体：{}", t.query, t.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keyed store of bounded conversation histories.
///
/// `append` must be atomic per user: concurrent appends for one key may not
/// lose or duplicate turns.
pub trait SessionStore: Send + Sync {
    /// Up to `last_n` most recent turns, oldest first.
    fn history(&self, user_id: &str, last_n: usize) -> Vec<ConversationTurn>;

    /// Record one turn, dropping the oldest beyond the store's bound.
    fn append(&self, user_id: &str, turn: ConversationTurn);

    /// Forget a user's session. Returns whether one existed.
    fn clear(&self, user_id: &str) -> bool;

    /// [`history`](Self::history) rendered with [`render_history`].
    fn get_history(&self, user_id: &str, last_n: usize) -> String {
        render_history(&self.history(user_id, last_n))
    }
}

pub struct InMemorySessionStore {
    max_turns: usize,
    sessions: RwLock<HashMap<String, VecDeque<ConversationTurn>>>,
}

impl InMemorySessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl SessionStore for InMemorySessionStore {
    fn history(&self, user_id: &str, last_n: usize) -> Vec<ConversationTurn> {
        let sessions = self
            .sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match sessions.get(user_id) {
            Some(turns) => {
                let skip = turns.len().saturating_sub(last_n);
                turns.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    fn append(&self, user_id: &str, turn: ConversationTurn) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let turns = sessions.entry(user_id.to_string()).or_default();
        turns.push_back(turn);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    fn clear(&self, user_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(user_id)
            .is_some()
    }
}
