pub mod activation;
pub mod audio;
pub mod config;
pub mod http;
pub mod nats;
pub mod services;
pub mod session;
pub mod stt;

pub use activation::{
    ActivationCoordinator, ActivationDetector, ActivationEvent, ActivationProbe, ActivationSource, DetectorConfig,
    DetectorState, HandshakeProbe, HandshakeSignal, WakeWordProbe,
};
pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioClip, AudioFile, AudioFrame, AudioResource,
    AudioResourceArbiter, AudioSource,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use nats::NatsClient;
pub use services::{ConsoleSynthesizer, EchoResponder, SpeechSynthesizer, TextResponder};
pub use session::{
    ConversationSession, ConversationTurn, EndReason, SessionConfig, SessionDeps, SessionEvent, SessionState,
    SessionStats,
};
pub use stt::{LanguageHint, RecognitionResult, SttBackend, SttBackendDescriptor, SttBackendSelector, SttError};
