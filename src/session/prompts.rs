use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::activation::ActivationSource;
use crate::stt::language::base_language;

/// Everything the assistant says on its own initiative
///
/// Localized entries are keyed by base language code and fall back to
/// English.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub wake_greeting: String,
    pub handshake_greeting: String,
    pub manual_greeting: String,

    /// Spoken after an end phrase
    pub farewell: String,

    /// Spoken when the turn limit is reached
    pub closing: String,

    /// Asked after a period of inactivity, when enabled
    pub continue_prompt: String,
    pub affirmative_words: Vec<String>,
    pub decline_words: Vec<String>,

    /// "Please repeat" after a listen that produced nothing
    pub retry: HashMap<String, String>,

    /// Substituted when the responder fails; `{text}` is the user's words
    pub apology: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            wake_greeting: "Hi! I heard you call my name. How can I help you today?".to_string(),
            handshake_greeting: "Hello! I detected your handshake. How can I help you today?".to_string(),
            manual_greeting: "Hi! I'm ready to assist you. What's on your mind?".to_string(),
            farewell: "Goodbye! Say my wake words to talk again anytime.".to_string(),
            closing: "Thank you for chatting with me! Call me again anytime.".to_string(),
            continue_prompt: "Is there anything else I can help you with today?".to_string(),
            affirmative_words: ["yes", "yeah", "sure", "okay", "more", "another", "continue"]
                .into_iter()
                .map(String::from)
                .collect(),
            decline_words: ["no", "nothing", "stop", "end", "bye", "goodbye", "done", "that's all"]
                .into_iter()
                .map(String::from)
                .collect(),
            retry: HashMap::from([
                ("en".to_string(), "Sorry, I didn't catch that. Could you please repeat?".to_string()),
                ("ml".to_string(), "ക്ഷമിക്കണം, എനിക്ക് മനസ്സിലായില്ല. ദയവായി വീണ്ടും പറയാമോ?".to_string()),
            ]),
            apology: HashMap::from([
                (
                    "en".to_string(),
                    "I heard you say: {text}. Sorry, I'm having trouble with my AI system right now.".to_string(),
                ),
                ("ml".to_string(), "AI പിശക്. നിങ്ങൾ പറഞ്ഞത്: {text}".to_string()),
            ]),
        }
    }
}

impl Prompts {
    pub fn greeting(&self, source: ActivationSource) -> &str {
        match source {
            ActivationSource::WakeWord => &self.wake_greeting,
            ActivationSource::Handshake => &self.handshake_greeting,
            ActivationSource::Manual => &self.manual_greeting,
        }
    }

    pub fn retry(&self, language: &str) -> &str {
        localized(&self.retry, language).unwrap_or("Sorry, I didn't catch that.")
    }

    pub fn apology(&self, language: &str, text: &str) -> String {
        localized(&self.apology, language)
            .unwrap_or("Sorry, I'm having trouble right now.")
            .replace("{text}", text)
    }

    pub fn is_affirmative(&self, text: &str) -> bool {
        contains_words(text, &self.affirmative_words)
    }

    pub fn is_decline(&self, text: &str) -> bool {
        contains_words(text, &self.decline_words)
    }
}

fn localized<'a>(table: &'a HashMap<String, String>, language: &str) -> Option<&'a str> {
    table
        .get(language)
        .or_else(|| table.get(base_language(language)))
        .or_else(|| table.get("en"))
        .map(String::as_str)
}

/// Case-insensitive substring match against a word list
pub(crate) fn contains_any(text: &str, words: &[String]) -> bool {
    let text = text.to_lowercase();
    words
        .iter()
        .any(|word| !word.is_empty() && text.contains(&word.to_lowercase()))
}

/// Whole-word match: "no more" contains "no", "I know" does not
fn contains_words(text: &str, words: &[String]) -> bool {
    let text = format!(" {} ", word_sequence(text));
    words.iter().any(|word| {
        let word = word_sequence(word);
        !word.is_empty() && text.contains(&format!(" {} ", word))
    })
}

/// Lowercase words separated by single spaces, punctuation dropped
fn word_sequence(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
