//! External capabilities consumed by a conversation
//!
//! The session only depends on the traits here; concrete providers live in
//! this module (local fallbacks) and in `crate::nats` (remote services).

mod responder;
mod speech;

pub use responder::{EchoResponder, TextResponder};
pub use speech::{ConsoleSynthesizer, SpeechSynthesizer};
