//! HTTP control API for the presentation layer
//!
//! - GET /health - Health check
//! - GET /status - Conversation, microphone and detector state
//! - POST /activate - Manual activation (409 while a conversation runs)
//! - POST /detectors/start - Resume wake word and handshake detection
//! - POST /detectors/stop - Pause detection

mod handlers;
mod routes;
mod state;

pub use handlers::{ActionResponse, StatusResponse};
pub use routes::create_router;
pub use state::AppState;
