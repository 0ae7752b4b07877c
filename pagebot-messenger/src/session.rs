//! Per-user rolling conversation history for the assistant strategy.
//!
//! Histories live in a sharded map: every read-modify-write holds only the
//! shard lock of the user it touches, so traffic from unrelated users does
//! not serialize behind a single lock. History is process-lifetime state.

use crate::traits::{RelayError, RelayResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Content of the system turn that opens every conversation.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Number of most recent turns kept when a history grows past it.
pub const HISTORY_WINDOW: usize = 20;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One immutable message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub const fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Owner of every user's conversation history.
#[derive(Debug, Default)]
pub struct SessionStore {
    histories: DashMap<String, Vec<ConversationTurn>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new user turn and return the history to send to the assistant.
    ///
    /// A first message starts `[system, user]`. Otherwise the stored history
    /// is cut to its last [`HISTORY_WINDOW`] turns, must end with an assistant
    /// turn, and gets the new user turn appended. A history that does not end
    /// with an assistant turn fails with [`RelayError::Sequence`] and is left
    /// untouched.
    pub fn prepare_for_turn(
        &self,
        user_id: &str,
        incoming_text: &str,
    ) -> RelayResult<Vec<ConversationTurn>> {
        match self.histories.entry(user_id.to_string()) {
            Entry::Occupied(mut slot) if !slot.get().is_empty() => {
                let existing = slot.get();
                let start = existing.len().saturating_sub(HISTORY_WINDOW);
                let window = &existing[start..];

                if window.last().map(ConversationTurn::role) != Some(Role::Assistant) {
                    return Err(RelayError::Sequence {
                        user_id: user_id.to_string(),
                    });
                }

                let mut history = window.to_vec();
                history.push(ConversationTurn::user(incoming_text));
                *slot.get_mut() = history.clone();
                Ok(history)
            }
            Entry::Occupied(mut slot) => {
                let history = opening_history(incoming_text);
                *slot.get_mut() = history.clone();
                Ok(history)
            }
            Entry::Vacant(slot) => {
                let history = opening_history(incoming_text);
                slot.insert(history.clone());
                Ok(history)
            }
        }
    }

    /// Store `snapshot` plus the assistant's reply as the user's history.
    ///
    /// `snapshot` is the history that was sent to the assistant, not a fresh
    /// read. An empty reply leaves the store untouched.
    pub fn record_assistant_reply(
        &self,
        user_id: &str,
        snapshot: &[ConversationTurn],
        reply_text: &str,
    ) {
        if reply_text.is_empty() {
            return;
        }

        let mut history = snapshot.to_vec();
        history.push(ConversationTurn::assistant(reply_text));
        self.histories.insert(user_id.to_string(), history);
    }

    /// Roll back the user turn opened by [`prepare_for_turn`](Self::prepare_for_turn)
    /// when no assistant reply will be recorded for it.
    ///
    /// Only acts when the stored history is still exactly `snapshot`. Returns
    /// whether anything was rolled back.
    pub fn abandon_turn(&self, user_id: &str, snapshot: &[ConversationTurn]) -> bool {
        let Entry::Occupied(mut slot) = self.histories.entry(user_id.to_string()) else {
            return false;
        };

        if slot.get().as_slice() != snapshot
            || snapshot.last().map(ConversationTurn::role) != Some(Role::User)
        {
            return false;
        }

        let kept = &snapshot[..snapshot.len() - 1];
        if kept.iter().all(|t| t.role() == Role::System) {
            slot.remove();
        } else {
            *slot.get_mut() = kept.to_vec();
        }
        true
    }

    /// Read-only snapshot of a user's history.
    pub fn get(&self, user_id: &str) -> Option<Vec<ConversationTurn>> {
        self.histories.get(user_id).map(|h| h.value().clone())
    }

    /// Number of users with a stored history.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, user_id: &str, history: Vec<ConversationTurn>) {
        self.histories.insert(user_id.to_string(), history);
    }
}

fn opening_history(incoming_text: &str) -> Vec<ConversationTurn> {
    vec![
        ConversationTurn::system(SYSTEM_PROMPT),
        ConversationTurn::user(incoming_text),
    ]
}
