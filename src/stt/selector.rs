use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::backend::{BackendKind, RecognitionResult, SttBackend, SttError, Transcript};
use super::language::LanguageHint;
use crate::audio::AudioClip;

/// Ordering and language policy for [`SttBackendSelector`]
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Backend tried before all others, by name
    pub preferred: Option<String>,
    /// Put online backends ahead of offline ones of any priority
    pub prefer_online: bool,
    /// Languages tried, in order, when the hint is `auto`
    pub languages: Vec<String>,
    /// Upper bound for each provider call
    pub request_timeout: Duration,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            preferred: None,
            prefer_online: true,
            languages: vec!["ml".to_string(), "en".to_string()],
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Detailed outcome of a recognition pass
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Recognized(RecognitionResult),
    /// At least one backend answered, none heard anything
    NoSpeech,
    /// No backend could be consulted, or every consulted one failed
    Failed,
}

impl Recognition {
    pub fn into_result(self) -> Option<RecognitionResult> {
        match self {
            Recognition::Recognized(result) => Some(result),
            _ => None,
        }
    }
}

/// Picks among several speech recognizers with fallback
///
/// Provider errors never leave the selector; they are logged and the next
/// backend is consulted.
pub struct SttBackendSelector {
    backends: Vec<Arc<dyn SttBackend>>,
    config: SelectorConfig,
}

impl SttBackendSelector {
    pub fn new(backends: Vec<Arc<dyn SttBackend>>, config: SelectorConfig) -> Self {
        let mut selector = Self { backends, config };
        selector.sort_backends();

        info!(
            "STT selector ready: order [{}], languages [{}]",
            selector.backend_order().join(", "),
            selector.config.languages.join(", ")
        );

        selector
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Backend names in the order they are consulted
    pub fn backend_order(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub async fn recognize(&self, clip: &AudioClip, hint: &LanguageHint) -> Option<RecognitionResult> {
        self.recognize_detailed(clip, hint).await.into_result()
    }

    pub async fn recognize_detailed(&self, clip: &AudioClip, hint: &LanguageHint) -> Recognition {
        let languages = hint.candidates(&self.config.languages);
        let mut consulted = 0usize;
        let mut failed = 0usize;

        for backend in &self.backends {
            let mut asked = false;

            for language in &languages {
                if !backend.is_available(language) {
                    debug!(backend = backend.name(), language = %language, "Backend unavailable, skipping");
                    continue;
                }

                if !asked {
                    asked = true;
                    consulted += 1;
                }

                match self.call(backend.as_ref(), clip, language).await {
                    Ok(transcript) if !transcript.text.is_empty() => {
                        info!(backend = backend.name(), language = %language, "Recognized: {}", transcript.text);
                        return Recognition::Recognized(RecognitionResult {
                            text: transcript.text,
                            language: language.clone(),
                            backend_name: backend.name().to_string(),
                            confidence: transcript.confidence,
                        });
                    }
                    Ok(_) => {
                        debug!(backend = backend.name(), language = %language, "No speech recognized");
                    }
                    Err(e) => {
                        warn!(backend = backend.name(), language = %language, "Recognition failed: {}", e);
                        failed += 1;
                        break;
                    }
                }
            }
        }

        if consulted == 0 || failed == consulted {
            error!(consulted, "All speech recognition backends failed");
            Recognition::Failed
        } else {
            Recognition::NoSpeech
        }
    }

    async fn call(&self, backend: &dyn SttBackend, clip: &AudioClip, language: &str) -> Result<Transcript, SttError> {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, backend.recognize(clip, language)).await {
            Ok(Ok(transcript)) => Ok(Transcript {
                text: transcript.text.trim().to_string(),
                confidence: transcript.confidence,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SttError::Timeout(timeout)),
        }
    }

    fn sort_backends(&mut self) {
        let preferred = self.config.preferred.clone();
        let prefer_online = self.config.prefer_online;

        // Stable sort keeps registration order among equal keys
        self.backends.sort_by_key(|backend| {
            let descriptor = backend.descriptor();
            let is_preferred = preferred.as_deref() == Some(descriptor.name.as_str());
            let offline = prefer_online && descriptor.kind == BackendKind::Offline;
            (!is_preferred, offline, std::cmp::Reverse(descriptor.priority))
        });

        if let Some(name) = &preferred {
            if !self.backends.iter().any(|b| b.name() == name) {
                warn!("Preferred STT backend '{}' is not registered", name);
            }
        }
    }
}

