//! Conversation history shared by the capture and reply flows
//!
//! The log is an ordered list of [`Turn`]s with exactly one system turn at
//! index 0. Every mutation goes through one `RwLock`, so appends from the
//! capture flow and token appends from the reply flow are serialized and
//! every snapshot is a gap-free prefix of the log.

use crate::messages::types::{Role, Turn};
use crate::utils::cancel::StopSignal;
use crate::{Result, TridentError};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
struct HistoryState {
    turns: Vec<Turn>,
    /// Index of the assistant turn currently being streamed into
    current: Option<usize>,
}

/// Handle to the in-progress assistant turn returned by
/// [`ConversationHistory::begin_assistant_turn`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssistantTurnHandle {
    index: usize,
}

impl AssistantTurnHandle {
    /// Position of the turn in the log
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Cloneable handle to one session's conversation log
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    inner: Arc<RwLock<HistoryState>>,
}

impl ConversationHistory {
    /// Create a history holding only the system turn
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self::from_turns(Vec::new(), system_prompt)
    }

    /// Rebuild a history from stored turns.
    ///
    /// A log that does not start with a system turn gets `system_prompt`
    /// inserted at index 0; system turns found anywhere else are dropped.
    pub fn from_turns(turns: Vec<Turn>, system_prompt: impl Into<String>) -> Self {
        let mut iter = turns.into_iter().peekable();
        let system = match iter.peek() {
            Some(first) if first.role == Role::System => iter.next(),
            _ => None,
        };

        let mut repaired = vec![system.unwrap_or_else(|| Turn::system(system_prompt))];
        for turn in iter {
            if turn.role == Role::System {
                warn!("Dropping extra system turn from stored history");
                continue;
            }
            repaired.push(turn);
        }

        Self {
            inner: Arc::new(RwLock::new(HistoryState {
                turns: repaired,
                current: None,
            })),
        }
    }

    /// Append a finished user or assistant turn
    pub fn append(&self, turn: Turn) -> Result<()> {
        let mut state = self.inner.write();
        if turn.role == Role::System {
            return Err(TridentError::HistoryError(
                "the log already has its system turn".to_string(),
            ));
        }
        if state.current.is_some() {
            return Err(TridentError::HistoryError(
                "an assistant turn is still in progress".to_string(),
            ));
        }
        debug!("History append: {} ({} chars)", turn.role, turn.content.len());
        state.turns.push(turn);
        Ok(())
    }

    /// Open an empty assistant turn that token fragments are appended to
    pub fn begin_assistant_turn(&self) -> Result<AssistantTurnHandle> {
        let mut state = self.inner.write();
        if state.current.is_some() {
            return Err(TridentError::HistoryError(
                "an assistant turn is already in progress".to_string(),
            ));
        }
        state.turns.push(Turn::assistant(String::new()));
        let index = state.turns.len() - 1;
        state.current = Some(index);
        Ok(AssistantTurnHandle { index })
    }

    /// Append a fragment to the in-progress assistant turn
    pub fn append_to_current(&self, fragment: &str) -> Result<()> {
        let mut state = self.inner.write();
        Self::push_fragment(&mut state, fragment)
    }

    /// Append a fragment unless `stop` has fired.
    ///
    /// The stop flag is read while the write lock is held, so once
    /// [`sync`](Self::sync) has returned after a trigger no fragment can land.
    /// Returns `Ok(false)` when the fragment was refused.
    pub fn append_to_current_if_live(&self, fragment: &str, stop: &StopSignal) -> Result<bool> {
        let mut state = self.inner.write();
        if stop.is_stopped() {
            return Ok(false);
        }
        Self::push_fragment(&mut state, fragment)?;
        Ok(true)
    }

    fn push_fragment(state: &mut HistoryState, fragment: &str) -> Result<()> {
        let last = state.turns.len() - 1;
        match state.current {
            Some(index) if index == last => {
                state.turns[index].content.push_str(fragment);
                Ok(())
            }
            _ => Err(TridentError::HistoryError(
                "the most recent turn is not an in-progress assistant turn".to_string(),
            )),
        }
    }

    /// Close the in-progress assistant turn, keeping its content as-is
    pub fn finish_assistant_turn(&self) -> Option<Turn> {
        let mut state = self.inner.write();
        let index = state.current.take()?;
        state.turns.get(index).cloned()
    }

    /// Whether an assistant turn is currently open
    pub fn in_progress(&self) -> bool {
        self.inner.read().current.is_some()
    }

    /// Immutable copy of the whole log
    pub fn snapshot(&self) -> Vec<Turn> {
        self.inner.read().turns.clone()
    }

    /// The system turn plus the longest suffix of the log that fits within
    /// `max_tokens`. The most recent turn is always included.
    pub fn snapshot_within(&self, max_tokens: usize) -> Vec<Turn> {
        let state = self.inner.read();
        let (system, rest) = match state.turns.split_first() {
            Some(split) => split,
            None => return Vec::new(),
        };

        let mut budget = max_tokens.saturating_sub(estimate_tokens(&system.content));
        let mut start = rest.len();
        for (i, turn) in rest.iter().enumerate().rev() {
            let cost = estimate_tokens(&turn.content);
            if cost > budget && start < rest.len() {
                break;
            }
            budget = budget.saturating_sub(cost);
            start = i;
        }

        let mut result = Vec::with_capacity(1 + rest.len() - start);
        result.push(system.clone());
        result.extend_from_slice(&rest[start..]);
        result
    }

    /// Drop every turn except the system turn
    pub fn reset(&self) {
        let mut state = self.inner.write();
        state.turns.truncate(1);
        state.current = None;
    }

    /// Wait until no mutation holds the log lock
    pub fn sync(&self) {
        drop(self.inner.write());
    }

    /// Content of the system turn
    pub fn system_prompt(&self) -> String {
        self.inner
            .read()
            .turns
            .first()
            .map(|t| t.content.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Turn> {
        self.inner.read().turns.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().turns.len()
    }

    /// Only the system turn is present
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

/// Estimate token count for a string
///
/// ~4 characters per token, or one per word when that is larger.
pub fn estimate_tokens(text: &str) -> usize {
    let char_estimate = (text.len() + 3) / 4;
    let word_estimate = text.split_whitespace().count();
    char_estimate.max(word_estimate).max(1)
}
