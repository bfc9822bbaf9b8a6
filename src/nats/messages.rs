use serde::{Deserialize, Serialize};

use crate::session::SessionState;

/// Speech recognition request for one captured utterance
#[derive(Debug, Serialize, Deserialize)]
pub struct RecognizeRequest {
    pub device_id: String,
    pub pcm: String, // Base64-encoded little-endian i16 PCM
    pub sample_rate: u32,
    pub channels: u16,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognizeReply {
    /// Empty when nothing was understood
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Set when the provider failed
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user: String,
    pub assistant: String,
}

/// Reply generation request
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub device_id: String,
    pub text: String,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReply {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Speech synthesis and playback request
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub device_id: String,
    pub text: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakReply {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Session state change broadcast
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStateMessage {
    pub device_id: String,
    pub session_id: String,
    pub state: SessionState,
    pub timestamp: String, // RFC3339 timestamp
}
