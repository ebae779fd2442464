//! Per-caller session: conversation turns, call state, and retry bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::directive::Directive;
use crate::state::CallState;

/// Recordings remembered per session for redelivery replay.
pub const REPLAY_MEMORY: usize = 32;

/// Who said a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Label used when the turn is rendered into prompt context.
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "AI",
        }
    }
}

/// One utterance in a session's history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker.label(), self.text)
    }
}

/// Conversational state for one caller, spanning the life of a phone call.
///
/// `turns` is append-only; the only way to add to it is [`Session::push_turn`].
/// History survives a new call from the same number until the session is evicted;
/// the exchange count does not.
#[derive(Debug, Clone)]
pub struct Session {
    caller_id: String,
    turns: Vec<Turn>,
    pub state: CallState,
    /// Assistant turns appended since the current call started.
    call_exchanges: usize,
    /// Directive emitted per accepted recording reference, oldest first.
    replies: VecDeque<(String, Directive)>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(caller_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            caller_id: caller_id.into(),
            turns: Vec::new(),
            state: CallState::AwaitingFirstUtterance,
            call_exchanges: 0,
            replies: VecDeque::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push_turn(&mut self, turn: Turn) {
        if turn.speaker == Speaker::Assistant {
            self.call_exchanges += 1;
        }
        self.turns.push(turn);
    }

    /// Completed user/assistant exchanges in the current call.
    pub fn exchanges(&self) -> usize {
        self.call_exchanges
    }

    /// A bare webhook event: the caller is (re)starting a call.
    pub fn begin_call(&mut self) {
        self.call_exchanges = 0;
    }

    /// Directive previously emitted for `recording`, if it is still remembered.
    pub fn reply_for(&self, recording: &str) -> Option<&Directive> {
        self.replies
            .iter()
            .rev()
            .find(|(r, _)| r == recording)
            .map(|(_, d)| d)
    }

    /// Remember the directive emitted for `recording`; the oldest entry goes past [`REPLAY_MEMORY`].
    pub fn remember_reply(&mut self, recording: impl Into<String>, directive: Directive) {
        if self.replies.len() == REPLAY_MEMORY {
            self.replies.pop_front();
        }
        self.replies.push_back((recording.into(), directive));
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// True when no event has touched the session for longer than `max_idle`.
    pub fn is_idle(&self, max_idle: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.last_activity > max_idle
    }
}
