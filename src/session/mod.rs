//! Conversation session management
//!
//! This module provides the `ConversationSession` state machine that drives
//! one activation through:
//! - A greeting chosen by activation source
//! - Listening and recognition through the shared microphone arbiter
//! - Reply generation and synthesis, with local fallbacks on failure
//! - Turn, end-phrase, inactivity and retry policies

mod config;
mod prompts;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use prompts::Prompts;
pub use session::{ConversationSession, SessionDeps, StateObserver, CONVERSATION_OWNER};
pub use state::{SessionEvent, SessionState};
pub use stats::{ConversationTurn, EndReason, SessionStats};
