use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation state machine
///
/// `Idle -> Greeting -> Listening -> Recognized -> Responding -> Speaking`,
/// looping back to `Listening` until the session moves to `Ending` and
/// finally `Idle` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Greeting,
    Listening,
    Recognized,
    Responding,
    Speaking,
    Ending,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Greeting => "greeting",
            SessionState::Listening => "listening",
            SessionState::Recognized => "recognized",
            SessionState::Responding => "responding",
            SessionState::Speaking => "speaking",
            SessionState::Ending => "ending",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state transition, as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: String,
    pub state: SessionState,
    pub timestamp: DateTime<Utc>,
}
