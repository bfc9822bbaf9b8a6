use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activation::ActivationSource;

/// Why a conversation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The user said an end phrase
    EndPhrase,
    MaxTurns,
    InactivityTimeout,
    /// Too many consecutive listens without recognized speech
    RecognitionFailures,
    /// The user declined to continue after an inactivity prompt
    Declined,
    Cancelled,
}

/// One exchange between user and assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Recognized user speech
    pub user: String,

    /// Reply that was spoken back
    pub assistant: String,

    /// Language the user spoke in
    pub language: String,

    pub timestamp: DateTime<Utc>,
}

/// Summary of a finished conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// What started the conversation
    pub source: ActivationSource,

    pub started_at: DateTime<Utc>,

    pub ended_at: DateTime<Utc>,

    /// Number of recognized user utterances
    pub turns: u32,

    pub end_reason: EndReason,

    /// Every completed exchange, oldest first
    pub transcript: Vec<ConversationTurn>,
}

impl SessionStats {
    pub fn duration_secs(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
