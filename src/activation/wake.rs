use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::detector::ActivationProbe;
use super::event::ActivationEvent;
use crate::audio::AudioResourceArbiter;
use crate::stt::{LanguageHint, Recognition, SttBackendSelector};

/// Arbiter owner id used while listening for the wake phrase
pub const WAKE_OWNER: &str = "wake_word";

#[derive(Debug, Clone)]
pub struct WakeWordConfig {
    /// Accepted wake phrases, e.g. "hey saras"
    pub phrases: Vec<String>,
    /// Language the wake phrase is recognized in
    pub language: LanguageHint,
    /// How long to wait for speech to begin
    pub listen_timeout: Duration,
    /// Longest utterance considered a wake phrase
    pub phrase_limit: Duration,
    /// Bound on one listen plus recognition
    pub iteration_timeout: Duration,
    /// Results scored below this are ignored; unscored results pass
    pub min_confidence: Option<f32>,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            phrases: vec!["hey saras".to_string(), "hello saras".to_string(), "saras".to_string()],
            language: LanguageHint::Locale("en".to_string()),
            listen_timeout: Duration::from_secs(3),
            phrase_limit: Duration::from_secs(4),
            iteration_timeout: Duration::from_secs(20),
            min_confidence: Some(0.7),
        }
    }
}

/// Spoken wake phrase detection
///
/// Listens briefly through the arbiter, recognizes the clip and matches it
/// against the configured phrases.
pub struct WakeWordProbe {
    arbiter: Arc<AudioResourceArbiter>,
    selector: Arc<SttBackendSelector>,
    config: WakeWordConfig,
}

impl WakeWordProbe {
    pub fn new(arbiter: Arc<AudioResourceArbiter>, selector: Arc<SttBackendSelector>, config: WakeWordConfig) -> Self {
        Self {
            arbiter,
            selector,
            config,
        }
    }

    /// Like [`Self::new`], but `None` when the selector has no backends
    ///
    /// Without a recognizer every attempt would fail and the detector
    /// would sit in cooldown while holding the microphone.
    pub fn try_new(
        arbiter: Arc<AudioResourceArbiter>,
        selector: Arc<SttBackendSelector>,
        config: WakeWordConfig,
    ) -> Option<Self> {
        if selector.is_empty() {
            warn!("No speech recognition backends, wake word detection disabled");
            return None;
        }
        Some(Self::new(arbiter, selector, config))
    }
}

#[async_trait::async_trait]
impl ActivationProbe for WakeWordProbe {
    async fn probe(&self) -> Result<Option<ActivationEvent>> {
        let Some(clip) = self
            .arbiter
            .listen(WAKE_OWNER, self.config.listen_timeout, self.config.phrase_limit)
            .await
        else {
            return Ok(None);
        };

        let result = match self.selector.recognize_detailed(&clip, &self.config.language).await {
            Recognition::Recognized(result) => result,
            Recognition::NoSpeech => return Ok(None),
            Recognition::Failed => bail!("speech recognition unavailable"),
        };

        debug!(heard = %result.text, confidence = ?result.confidence, "Wake detector heard speech");

        if let (Some(min), Some(confidence)) = (self.config.min_confidence, result.confidence) {
            if confidence < min {
                debug!(confidence, min, "Recognition confidence too low for a wake phrase");
                return Ok(None);
            }
        }

        Ok(match_wake_phrase(&result.text, &self.config.phrases).map(ActivationEvent::wake_word))
    }

    fn iteration_timeout(&self) -> Duration {
        self.config.iteration_timeout
    }
}

/// Shortest clipped recognition accepted as part of a phrase
const MIN_FRAGMENT_CHARS: usize = 4;

/// Find the wake phrase that matches `heard`
///
/// Matching ignores case and whitespace and accepts containment in either
/// direction, so "hey saras what time is it" and a clipped "hey sa" both
/// match "hey saras". A fragment must cover at least half the phrase and
/// [`MIN_FRAGMENT_CHARS`] characters; a bare "hey" wakes nothing.
pub fn match_wake_phrase(heard: &str, phrases: &[String]) -> Option<String> {
    let heard = normalize(heard);
    if heard.is_empty() {
        return None;
    }
    let heard_len = heard.chars().count();

    phrases
        .iter()
        .find(|phrase| {
            let phrase = normalize(phrase);
            if phrase.is_empty() {
                return false;
            }
            if heard.contains(&phrase) {
                return true;
            }
            let phrase_len = phrase.chars().count();
            heard_len >= MIN_FRAGMENT_CHARS && heard_len * 2 >= phrase_len && phrase.contains(&heard)
        })
        .cloned()
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
