use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What started a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationSource {
    WakeWord,
    Handshake,
    Manual,
}

impl ActivationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationSource::WakeWord => "wake_word",
            ActivationSource::Handshake => "handshake",
            ActivationSource::Manual => "manual",
        }
    }
}

impl fmt::Display for ActivationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to start a conversation, produced by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationEvent {
    pub source: ActivationSource,
    pub timestamp: DateTime<Utc>,
    /// Wake phrase that matched, for voice activations
    pub matched_phrase: Option<String>,
}

impl ActivationEvent {
    pub fn new(source: ActivationSource) -> Self {
        Self {
            source,
            timestamp: Utc::now(),
            matched_phrase: None,
        }
    }

    pub fn wake_word(phrase: impl Into<String>) -> Self {
        Self {
            matched_phrase: Some(phrase.into()),
            ..Self::new(ActivationSource::WakeWord)
        }
    }

    pub fn handshake() -> Self {
        Self::new(ActivationSource::Handshake)
    }

    pub fn manual() -> Self {
        Self::new(ActivationSource::Manual)
    }
}
