use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompts::Prompts;
use crate::stt::LanguageHint;

/// Conversation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Recognized utterances before the session closes itself
    pub max_turns: u32,

    /// Silence since the last recognized utterance that ends the session
    pub inactivity_timeout_secs: u64,

    /// Consecutive listens without recognized speech before giving up
    pub max_listen_attempts: u32,

    /// Wait for the user to start speaking
    pub listen_timeout_secs: u64,

    /// Longest single utterance
    pub phrase_limit_secs: u64,

    pub responder_timeout_secs: u64,

    pub speak_timeout_secs: u64,

    /// Pause after speaking before the microphone opens again
    pub settle_delay_ms: u64,

    /// Language of user speech (`auto`, `en`, `ml`, ...)
    pub language_hint: LanguageHint,

    /// Case-insensitive substrings that end the conversation
    pub end_phrases: Vec<String>,

    /// Turns of context handed to the responder
    pub history_limit: usize,

    /// Ask "anything else?" on inactivity instead of ending right away
    pub ask_to_continue: bool,

    pub prompts: Prompts,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 3,
            inactivity_timeout_secs: 60,
            max_listen_attempts: 3,
            listen_timeout_secs: 10,
            phrase_limit_secs: 15,
            responder_timeout_secs: 15,
            speak_timeout_secs: 30,
            settle_delay_ms: 500,
            language_hint: LanguageHint::Auto,
            end_phrases: [
                "goodbye", "bye", "see you", "that's all", "thanks", "thank you", "stop", "quit", "വിട", "നന്ദി",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            history_limit: 5,
            ask_to_continue: false,
            prompts: Prompts::default(),
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::from_secs(self.phrase_limit_secs)
    }

    pub fn responder_timeout(&self) -> Duration {
        Duration::from_secs(self.responder_timeout_secs)
    }

    pub fn speak_timeout(&self) -> Duration {
        Duration::from_secs(self.speak_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
