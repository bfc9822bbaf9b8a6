// Shared mocks for integration tests
//
// Each test binary includes this module and uses a subset of it.
#![allow(dead_code)]

use anyhow::{bail, Result};
use saras_voice::audio::{ArbiterConfig, AudioBackend, AudioClip, AudioFrame, AudioResourceArbiter};
use saras_voice::services::{SpeechSynthesizer, TextResponder};
use saras_voice::session::{ConversationTurn, SessionConfig, SessionDeps};
use saras_voice::stt::{
    BackendKind, SelectorConfig, SttBackend, SttBackendDescriptor, SttBackendSelector, SttError, Transcript,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const FRAME_MS: u64 = 100;
const FRAME_SAMPLES: usize = 1600; // 100ms at 16kHz mono

pub fn frame(amplitude: i16) -> AudioFrame {
    AudioFrame {
        samples: vec![amplitude; FRAME_SAMPLES],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    }
}

pub fn clip() -> AudioClip {
    AudioClip {
        samples: vec![2000; FRAME_SAMPLES],
        sample_rate: 16000,
        channels: 1,
    }
}

/// Capture device that either "hears" a short utterance on every start or
/// stays silent forever
pub struct MockMic {
    speaking: bool,
    starts: Arc<AtomicUsize>,
    task: Option<JoinHandle<()>>,
    fail_start: bool,
}

impl MockMic {
    /// Every capture yields 500ms of speech followed by silence
    pub fn speaking() -> Self {
        Self {
            speaking: true,
            starts: Arc::new(AtomicUsize::new(0)),
            task: None,
            fail_start: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            speaking: false,
            ..Self::speaking()
        }
    }

    pub fn broken() -> Self {
        Self {
            fail_start: true,
            ..Self::speaking()
        }
    }

    pub fn starts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.starts)
    }
}

#[async_trait::async_trait]
impl AudioBackend for MockMic {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.fail_start {
            bail!("device unplugged");
        }
        self.starts.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(100);
        let speaking = self.speaking;
        self.task = Some(tokio::spawn(async move {
            if speaking {
                for i in 0..20 {
                    let amplitude = if i < 5 { 3000 } else { 0 };
                    tokio::time::sleep(Duration::from_millis(FRAME_MS)).await;
                    if tx.send(frame(amplitude)).await.is_err() {
                        return;
                    }
                }
            }
            tx.closed().await;
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "mock-mic"
    }
}

pub fn arbiter(mic: MockMic) -> Arc<AudioResourceArbiter> {
    Arc::new(AudioResourceArbiter::new(Box::new(mic), ArbiterConfig::default()))
}

/// Recognizer that replays scripted answers, then returns empty text
pub struct ScriptedStt {
    descriptor: SttBackendDescriptor,
    available: bool,
    script: Mutex<VecDeque<Result<Transcript, SttError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedStt {
    pub fn new(name: &str, kind: BackendKind, priority: i32) -> Self {
        Self {
            descriptor: SttBackendDescriptor {
                name: name.to_string(),
                kind,
                priority,
                languages: vec!["en".to_string(), "ml".to_string()],
            },
            available: true,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn online(name: &str) -> Self {
        Self::new(name, BackendKind::Online, 0)
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.descriptor.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn saying(self, texts: &[&str]) -> Self {
        self.script
            .lock()
            .unwrap()
            .extend(texts.iter().map(|t| Ok(Transcript::new(t.to_string()))));
        self
    }

    /// Scripted answers carrying a recognizer confidence
    pub fn saying_scored(self, answers: &[(&str, f32)]) -> Self {
        self.script.lock().unwrap().extend(answers.iter().map(|(t, c)| {
            Ok(Transcript {
                text: t.to_string(),
                confidence: Some(*c),
            })
        }));
        self
    }

    pub fn failing(self, times: usize) -> Self {
        self.script
            .lock()
            .unwrap()
            .extend((0..times).map(|_| Err(SttError::Service("quota exceeded".to_string()))));
        self
    }

    /// Languages `recognize` was called with, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SttBackend for ScriptedStt {
    fn descriptor(&self) -> &SttBackendDescriptor {
        &self.descriptor
    }

    fn is_available(&self, language: &str) -> bool {
        self.available && self.descriptor.supports(language)
    }

    async fn recognize(&self, _clip: &AudioClip, language: &str) -> Result<Transcript, SttError> {
        self.calls.lock().unwrap().push(language.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(transcript)) => Ok(transcript),
            Some(Err(e)) => Err(e),
            None => Ok(Transcript::empty()),
        }
    }
}

/// Selector over one scripted English recognizer
pub fn english_selector(stt: Arc<ScriptedStt>) -> Arc<SttBackendSelector> {
    let config = SelectorConfig {
        languages: vec!["en".to_string()],
        ..SelectorConfig::default()
    };
    Arc::new(SttBackendSelector::new(vec![stt as Arc<dyn SttBackend>], config))
}

pub struct MockResponder {
    fail: bool,
    delay: Duration,
    history_lengths: Mutex<Vec<usize>>,
}

impl MockResponder {
    pub fn replying() -> Self {
        Self {
            fail: false,
            delay: Duration::ZERO,
            history_lengths: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::replying()
        }
    }

    pub fn history_lengths(&self) -> Vec<usize> {
        self.history_lengths.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TextResponder for MockResponder {
    async fn generate(&self, text: &str, history: &[ConversationTurn]) -> Result<String> {
        self.history_lengths.lock().unwrap().push(history.len());
        tokio::time::sleep(self.delay).await;
        if self.fail {
            bail!("model overloaded");
        }
        Ok(format!("Reply to {}", text))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Default)]
pub struct RecordingSynth {
    fail: bool,
    spoken: Mutex<Vec<(String, String)>>,
}

impl RecordingSynth {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.spoken.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn spoken(&self) -> Vec<(String, String)> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for RecordingSynth {
    async fn speak(&self, text: &str, language: &str) -> Result<()> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));
        if self.fail {
            bail!("speaker disconnected");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn deps(
    arbiter: Arc<AudioResourceArbiter>,
    selector: Arc<SttBackendSelector>,
    responder: Arc<dyn TextResponder>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
) -> SessionDeps {
    SessionDeps {
        arbiter,
        selector,
        responder,
        synthesizer,
    }
}

/// Session policy with short pauses, everything else default
pub fn session_config() -> SessionConfig {
    SessionConfig {
        settle_delay_ms: 0,
        ..SessionConfig::default()
    }
}
