use super::state::AppState;
use crate::activation::DetectorStatus;
use crate::audio::AudioResource;
use crate::session::{SessionState, SessionStats};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::info;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session_active: bool,
    pub state: SessionState,
    pub microphone: AudioResource,
    pub detectors: Vec<DetectorStatus>,
    /// Recognizers in fallback order
    pub stt_backends: Vec<String>,
    pub last_session: Option<SessionStats>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /status
/// Conversation, microphone and detector state
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let coordinator = &state.coordinator;

    Json(StatusResponse {
        session_active: coordinator.is_session_active(),
        state: coordinator.current_state(),
        microphone: state.arbiter.resource(),
        detectors: coordinator.detector_states(),
        stt_backends: state.selector.backend_order(),
        last_session: coordinator.last_session(),
    })
}

/// POST /activate
/// Start a conversation without a wake word or gesture
pub async fn activate(State(state): State<AppState>) -> impl IntoResponse {
    if !state.coordinator.trigger_manual_activation() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "A conversation is already in progress".to_string(),
            }),
        )
            .into_response();
    }

    info!("Manual activation via HTTP");

    (
        StatusCode::ACCEPTED,
        Json(ActionResponse {
            status: "activated".to_string(),
            message: "Conversation started".to_string(),
        }),
    )
        .into_response()
}

/// POST /detectors/start
pub async fn start_detectors(State(state): State<AppState>) -> impl IntoResponse {
    state.coordinator.start_detectors().await;

    Json(ActionResponse {
        status: "started".to_string(),
        message: "Activation detectors running".to_string(),
    })
}

/// POST /detectors/stop
pub async fn stop_detectors(State(state): State<AppState>) -> impl IntoResponse {
    state.coordinator.stop_detectors().await;

    Json(ActionResponse {
        status: "stopped".to_string(),
        message: "Activation detectors stopped".to_string(),
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
