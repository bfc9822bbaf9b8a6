// Integration tests for the conversation state machine
//
// The session runs against the real arbiter and selector; only the
// devices and remote services are mocked.

mod common;

use common::{arbiter, deps, english_selector, session_config, MockMic, MockResponder, RecordingSynth, ScriptedStt};
use saras_voice::activation::ActivationEvent;
use saras_voice::services::{SpeechSynthesizer, TextResponder};
use saras_voice::session::{ConversationSession, EndReason, SessionConfig, SessionState, SessionStats};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Harness {
    mic: MockMic,
    stt: Arc<ScriptedStt>,
    responder: Arc<dyn TextResponder>,
    synth: Arc<RecordingSynth>,
    config: SessionConfig,
    event: ActivationEvent,
    cancelled: Arc<AtomicBool>,
}

impl Harness {
    fn new(heard: &[&str]) -> Self {
        Self {
            mic: MockMic::speaking(),
            stt: Arc::new(ScriptedStt::online("stt").saying(heard)),
            responder: Arc::new(MockResponder::replying()),
            synth: Arc::new(RecordingSynth::default()),
            config: SessionConfig {
                language_hint: "en".into(),
                ..session_config()
            },
            event: ActivationEvent::wake_word("hey saras"),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn run(self) -> (SessionStats, Vec<SessionState>, Arc<RecordingSynth>) {
        let states = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::clone(&states);
        let synth = Arc::clone(&self.synth);

        let session = ConversationSession::new(
            "test-session",
            self.event,
            self.config,
            deps(
                arbiter(self.mic),
                english_selector(self.stt),
                self.responder,
                self.synth as Arc<dyn SpeechSynthesizer>,
            ),
        )
        .with_observer(Box::new(move |state| observed.lock().unwrap().push(state)))
        .with_cancel_flag(self.cancelled);

        let stats = session.run().await;
        let states = states.lock().unwrap().clone();
        (stats, states, synth)
    }
}

fn count(states: &[SessionState], wanted: SessionState) -> usize {
    states.iter().filter(|s| **s == wanted).count()
}

#[tokio::test(start_paused = true)]
async fn test_turn_limit_ends_after_third_reply() {
    let responder = Arc::new(MockResponder::replying());
    let mut harness = Harness::new(&["what time is it", "tell me a joke", "how are you", "one more"]);
    harness.responder = responder.clone();

    let (stats, states, synth) = harness.run().await;

    assert_eq!(stats.end_reason, EndReason::MaxTurns);
    assert_eq!(stats.turns, 3);
    assert_eq!(stats.transcript.len(), 3);
    assert_eq!(count(&states, SessionState::Listening), 3);
    assert_eq!(count(&states, SessionState::Speaking), 3);
    assert_eq!(&states[states.len() - 2..], &[SessionState::Speaking, SessionState::Ending]);

    let spoken = synth.texts();
    assert_eq!(spoken.first().unwrap(), "Hi! I heard you call my name. How can I help you today?");
    assert_eq!(spoken.last().unwrap(), &SessionConfig::default().prompts.closing);

    // Earlier turns are passed along as context
    assert_eq!(responder.history_lengths(), vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_end_phrase_ends_from_recognized() {
    let (stats, states, synth) = Harness::new(&["ok thanks bye"]).run().await;

    assert_eq!(stats.end_reason, EndReason::EndPhrase);
    assert_eq!(stats.turns, 1);
    assert!(stats.transcript.is_empty());
    assert_eq!(
        states,
        vec![
            SessionState::Greeting,
            SessionState::Listening,
            SessionState::Recognized,
            SessionState::Ending,
        ]
    );
    assert_eq!(synth.texts().last().unwrap(), &SessionConfig::default().prompts.farewell);
}

#[tokio::test(start_paused = true)]
async fn test_end_phrase_matches_case_insensitively() {
    let (stats, _, _) = Harness::new(&["OK, GOODBYE then"]).run().await;
    assert_eq!(stats.end_reason, EndReason::EndPhrase);
}

#[tokio::test(start_paused = true)]
async fn test_responder_failure_speaks_apology_and_continues() {
    let mut harness = Harness::new(&["what's the weather", "thanks bye"]);
    harness.responder = Arc::new(MockResponder::failing());

    let (stats, _, synth) = harness.run().await;

    assert_eq!(stats.end_reason, EndReason::EndPhrase);
    assert_eq!(stats.turns, 2);
    let apology = &stats.transcript[0].assistant;
    assert!(apology.contains("what's the weather"));
    assert!(apology.contains("Sorry"));
    assert!(synth.texts().contains(apology));
}

#[tokio::test(start_paused = true)]
async fn test_responder_timeout_speaks_apology() {
    let mut harness = Harness::new(&["tell me everything", "bye"]);
    harness.responder = Arc::new(MockResponder::slow(Duration::from_secs(120)));

    let (stats, _, _) = harness.run().await;

    assert_eq!(stats.turns, 2);
    assert!(stats.transcript[0].assistant.contains("Sorry"));
}

#[tokio::test(start_paused = true)]
async fn test_synthesizer_failure_keeps_listening() {
    let mut harness = Harness::new(&["hello there", "goodbye"]);
    harness.synth = Arc::new(RecordingSynth::failing());

    let (stats, states, _) = harness.run().await;

    assert_eq!(stats.end_reason, EndReason::EndPhrase);
    assert_eq!(stats.turns, 2);
    assert_eq!(count(&states, SessionState::Listening), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_misses_end_session() {
    let (stats, states, synth) = Harness::new(&[]).run().await;

    assert_eq!(stats.end_reason, EndReason::RecognitionFailures);
    assert_eq!(stats.turns, 0);
    assert_eq!(count(&states, SessionState::Listening), 3);

    // A retry prompt after every miss but the last
    let retry = SessionConfig::default().prompts.retry("en").to_string();
    assert_eq!(synth.texts().iter().filter(|t| **t == retry).count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_miss_counter_resets_after_recognition() {
    // miss, miss, hit, miss, miss, hit(end)
    let (stats, _, _) = Harness::new(&["", "", "hello", "", "", "bye"]).run().await;

    assert_eq!(stats.end_reason, EndReason::EndPhrase);
    assert_eq!(stats.turns, 2);
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_timeout_ends_session() {
    let mut harness = Harness::new(&[]);
    harness.mic = MockMic::silent();
    harness.config.max_listen_attempts = 100;

    let (stats, states, _) = harness.run().await;

    assert_eq!(stats.end_reason, EndReason::InactivityTimeout);
    assert_eq!(stats.turns, 0);
    // 10s listen windows against a 60s timeout
    assert_eq!(count(&states, SessionState::Listening), 6);
}

#[tokio::test(start_paused = true)]
async fn test_ask_to_continue_declined() {
    let mut harness = Harness::new(&["tell me a long story", "no, nothing else"]);
    harness.responder = Arc::new(MockResponder::slow(Duration::from_secs(30)));
    harness.config.responder_timeout_secs = 60;
    harness.config.inactivity_timeout_secs = 20;
    harness.config.ask_to_continue = true;

    let (stats, _, synth) = harness.run().await;

    assert_eq!(stats.end_reason, EndReason::Declined);
    assert!(synth.texts().contains(&SessionConfig::default().prompts.continue_prompt));
}

#[tokio::test(start_paused = true)]
async fn test_ask_to_continue_no_more_is_a_decline() {
    let mut harness = Harness::new(&["tell me a long story", "no more"]);
    harness.responder = Arc::new(MockResponder::slow(Duration::from_secs(30)));
    harness.config.responder_timeout_secs = 60;
    harness.config.inactivity_timeout_secs = 20;
    harness.config.ask_to_continue = true;

    let (stats, _, _) = harness.run().await;

    assert_eq!(stats.end_reason, EndReason::Declined);
    assert_eq!(stats.turns, 1);
}

#[tokio::test(start_paused = true)]
async fn test_ask_to_continue_affirmed() {
    let mut harness = Harness::new(&["tell me a long story", "yes please", "bye"]);
    harness.responder = Arc::new(MockResponder::slow(Duration::from_secs(30)));
    harness.config.responder_timeout_secs = 60;
    harness.config.inactivity_timeout_secs = 20;
    harness.config.ask_to_continue = true;

    let (stats, _, _) = harness.run().await;

    assert_eq!(stats.end_reason, EndReason::EndPhrase);
    // The "yes" answer is not a turn
    assert_eq!(stats.turns, 2);
}

#[tokio::test(start_paused = true)]
async fn test_greeting_depends_on_source() {
    let mut harness = Harness::new(&["bye"]);
    harness.event = ActivationEvent::handshake();

    let (stats, _, synth) = harness.run().await;

    assert_eq!(stats.source, saras_voice::ActivationSource::Handshake);
    assert_eq!(
        synth.texts()[0],
        "Hello! I detected your handshake. How can I help you today?"
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_session_stops_at_loop_head() {
    let harness = Harness::new(&["hello"]);
    harness.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);

    let (stats, states, _) = harness.run().await;

    assert_eq!(stats.end_reason, EndReason::Cancelled);
    assert_eq!(states, vec![SessionState::Greeting, SessionState::Ending]);
}
