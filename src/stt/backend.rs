use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::AudioClip;

/// Where a recognizer runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Online,
    Offline,
}

/// Static description of one speech recognition provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttBackendDescriptor {
    /// Unique backend name (e.g. "deepgram", "whisper")
    pub name: String,
    pub kind: BackendKind,
    /// Higher is tried earlier during fallback
    pub priority: i32,
    /// Language codes this backend can recognize
    pub languages: Vec<String>,
}

impl SttBackendDescriptor {
    pub fn supports(&self, language: &str) -> bool {
        let base = super::language::base_language(language);
        self.languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language) || l.eq_ignore_ascii_case(base))
    }
}

/// Text produced by a single provider call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub confidence: Option<f32>,
}

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Outcome of one listen attempt that produced text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    pub language: String,
    pub backend_name: String,
    pub confidence: Option<f32>,
}

/// Failures a provider can report
///
/// An empty transcript is not an error: providers return
/// `Ok(Transcript::empty())` when they understood nothing.
#[derive(Debug, thiserror::Error)]
pub enum SttError {
    /// The provider cannot serve this request right now
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The provider did not answer in time
    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),

    /// Network, auth, quota or protocol failure
    #[error("service error: {0}")]
    Service(String),
}

/// Speech-to-text provider
#[async_trait::async_trait]
pub trait SttBackend: Send + Sync {
    fn descriptor(&self) -> &SttBackendDescriptor;

    /// Whether the provider can currently recognize `language`
    fn is_available(&self, language: &str) -> bool;

    async fn recognize(&self, clip: &AudioClip, language: &str) -> Result<Transcript, SttError>;

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}
