pub mod adapters;
pub mod client;
pub mod messages;

pub use adapters::{NatsResponder, NatsSttBackend, NatsSynthesizer};
pub use client::{NatsClient, SESSION_STATE_SUBJECT};
pub use messages::{
    GenerateReply, GenerateRequest, RecognizeReply, RecognizeRequest, SessionStateMessage, SpeakReply, SpeakRequest,
};
