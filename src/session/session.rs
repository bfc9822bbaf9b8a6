use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::prompts::contains_any;
use super::state::SessionState;
use super::stats::{ConversationTurn, EndReason, SessionStats};
use crate::activation::ActivationEvent;
use crate::audio::AudioResourceArbiter;
use crate::services::{SpeechSynthesizer, TextResponder};
use crate::stt::language::base_language;
use crate::stt::{detect_script_language, LanguageHint, RecognitionResult, SttBackendSelector};

/// Arbiter owner id used while a conversation listens
pub const CONVERSATION_OWNER: &str = "conversation";

/// Collaborators a conversation needs, shared between sessions
#[derive(Clone)]
pub struct SessionDeps {
    pub arbiter: Arc<AudioResourceArbiter>,
    pub selector: Arc<SttBackendSelector>,
    pub responder: Arc<dyn TextResponder>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

pub type StateObserver = Box<dyn Fn(SessionState) + Send + Sync>;

/// One activation-to-termination conversation
///
/// Turns are strictly sequential: the reply is spoken to completion before
/// the microphone is opened again. Provider failures never end the session;
/// only an end phrase, the turn limit, inactivity, repeated recognition
/// misses or cancellation do.
pub struct ConversationSession {
    id: String,
    event: ActivationEvent,
    config: SessionConfig,
    deps: SessionDeps,
    observer: StateObserver,
    cancelled: Arc<AtomicBool>,

    state: SessionState,
    turns: u32,
    last_activity: Instant,
    language: String,
    transcript: Vec<ConversationTurn>,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, event: ActivationEvent, config: SessionConfig, deps: SessionDeps) -> Self {
        let language = match &config.language_hint {
            LanguageHint::Locale(code) => code.clone(),
            LanguageHint::Auto => "en".to_string(),
        };

        Self {
            id: id.into(),
            event,
            config,
            deps,
            observer: Box::new(|_| {}),
            cancelled: Arc::new(AtomicBool::new(false)),
            state: SessionState::Idle,
            turns: 0,
            last_activity: Instant::now(),
            language,
            transcript: Vec::new(),
        }
    }

    /// Called on every state transition
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Flag checked at the head of every turn
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the conversation to its end
    pub async fn run(mut self) -> SessionStats {
        let started_at = Utc::now();
        info!(session_id = %self.id, source = %self.event.source, "Conversation started");

        self.set_state(SessionState::Greeting);
        let greeting = self.config.prompts.greeting(self.event.source).to_string();
        self.say(&greeting, "en").await;
        self.last_activity = Instant::now();

        let end_reason = self.converse().await;

        self.set_state(SessionState::Ending);
        info!(
            session_id = %self.id,
            turns = self.turns,
            reason = ?end_reason,
            "Conversation ended"
        );

        SessionStats {
            session_id: self.id.clone(),
            source: self.event.source,
            started_at,
            ended_at: Utc::now(),
            turns: self.turns,
            end_reason,
            transcript: std::mem::take(&mut self.transcript),
        }
    }

    async fn converse(&mut self) -> EndReason {
        let mut misses = 0u32;

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return EndReason::Cancelled;
            }

            if self.last_activity.elapsed() >= self.config.inactivity_timeout() {
                if !self.config.ask_to_continue {
                    info!(session_id = %self.id, "Inactivity timeout");
                    return EndReason::InactivityTimeout;
                }
                if !self.ask_to_continue().await {
                    return EndReason::Declined;
                }
                self.last_activity = Instant::now();
                misses = 0;
                continue;
            }

            self.set_state(SessionState::Listening);
            let Some(result) = self.listen(&self.config.language_hint).await else {
                misses += 1;
                debug!(session_id = %self.id, misses, "Nothing recognized");
                if misses >= self.config.max_listen_attempts {
                    info!(session_id = %self.id, misses, "Giving up after repeated recognition failures");
                    return EndReason::RecognitionFailures;
                }
                let retry = self.config.prompts.retry(&self.language).to_string();
                self.say(&retry, &self.language).await;
                continue;
            };

            misses = 0;
            self.turns += 1;
            self.last_activity = Instant::now();
            self.language = result.language.clone();
            self.set_state(SessionState::Recognized);
            info!(session_id = %self.id, turn = self.turns, language = %result.language, "User said: {}", result.text);

            if contains_any(&result.text, &self.config.end_phrases) {
                let farewell = self.config.prompts.farewell.clone();
                self.say(&farewell, "en").await;
                return EndReason::EndPhrase;
            }

            self.set_state(SessionState::Responding);
            let reply = self.respond(&result).await;

            self.set_state(SessionState::Speaking);
            let voice = reply_language(&reply, &result.language);
            self.say(&reply, &voice).await;

            self.transcript.push(ConversationTurn {
                user: result.text,
                assistant: reply,
                language: result.language,
                timestamp: Utc::now(),
            });

            if self.turns >= self.config.max_turns {
                info!(session_id = %self.id, "Turn limit reached");
                let closing = self.config.prompts.closing.clone();
                self.say(&closing, "en").await;
                return EndReason::MaxTurns;
            }
        }
    }

    async fn listen(&self, hint: &LanguageHint) -> Option<RecognitionResult> {
        let clip = self
            .deps
            .arbiter
            .listen(CONVERSATION_OWNER, self.config.listen_timeout(), self.config.phrase_limit())
            .await?;
        self.deps.selector.recognize(&clip, hint).await
    }

    async fn respond(&self, result: &RecognitionResult) -> String {
        let skip = self.transcript.len().saturating_sub(self.config.history_limit);
        let history = &self.transcript[skip..];
        let timeout = self.config.responder_timeout();

        let outcome = tokio::time::timeout(timeout, self.deps.responder.generate(&result.text, history)).await;
        match outcome {
            Ok(Ok(reply)) if !reply.trim().is_empty() => return reply,
            Ok(Ok(_)) => warn!(responder = self.deps.responder.name(), "Responder returned an empty reply"),
            Ok(Err(e)) => warn!(responder = self.deps.responder.name(), "Responder failed: {:#}", e),
            Err(_) => warn!(responder = self.deps.responder.name(), "Responder timed out after {:?}", timeout),
        }

        self.config.prompts.apology(&result.language, &result.text)
    }

    /// Speak and wait for playback plus the settle delay
    async fn say(&self, text: &str, language: &str) {
        let timeout = self.config.speak_timeout();
        match tokio::time::timeout(timeout, self.deps.synthesizer.speak(text, language)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(session_id = %self.id, "Speech synthesis failed: {:#}", e),
            Err(_) => warn!(session_id = %self.id, "Speech synthesis timed out after {:?}", timeout),
        }
        tokio::time::sleep(self.config.settle_delay()).await;
    }

    async fn ask_to_continue(&mut self) -> bool {
        self.set_state(SessionState::Speaking);
        let prompt = self.config.prompts.continue_prompt.clone();
        self.say(&prompt, "en").await;

        self.set_state(SessionState::Listening);
        let answer = self.listen(&LanguageHint::Locale("en".to_string())).await;

        // Decline wins: "no more" carries both
        let keep_going = match &answer {
            None => false,
            Some(result) if self.config.prompts.is_decline(&result.text) => false,
            Some(result) if self.config.prompts.is_affirmative(&result.text) => true,
            // Any other speech means the user is still engaged
            Some(_) => true,
        };

        info!(session_id = %self.id, keep_going, "Asked to continue");
        keep_going
    }

    fn set_state(&mut self, state: SessionState) {
        debug!(session_id = %self.id, "{} -> {}", self.state, state);
        self.state = state;
        (self.observer)(state);
    }
}

/// Voice for the reply: Malayalam script wins, otherwise the user's language
/// unless that was Malayalam and the reply is not.
fn reply_language(reply: &str, recognized: &str) -> String {
    match detect_script_language(reply) {
        Some(language) => language.to_string(),
        None if base_language(recognized) == "ml" => "en".to_string(),
        None => recognized.to_string(),
    }
}
