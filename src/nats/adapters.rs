//! Speech services reached over NATS request/reply

use anyhow::{bail, Result};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

use super::client::NatsClient;
use super::messages::{
    GenerateReply, GenerateRequest, HistoryEntry, RecognizeReply, RecognizeRequest, SpeakReply, SpeakRequest,
};
use crate::audio::AudioClip;
use crate::services::{SpeechSynthesizer, TextResponder};
use crate::session::ConversationTurn;
use crate::stt::{SttBackend, SttBackendDescriptor, SttError, Transcript};

/// Recognizer served by a remote worker on `subject`
pub struct NatsSttBackend {
    client: Arc<NatsClient>,
    descriptor: SttBackendDescriptor,
    subject: String,
    timeout: Duration,
}

impl NatsSttBackend {
    pub fn new(client: Arc<NatsClient>, descriptor: SttBackendDescriptor, subject: String, timeout: Duration) -> Self {
        Self {
            client,
            descriptor,
            subject,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl SttBackend for NatsSttBackend {
    fn descriptor(&self) -> &SttBackendDescriptor {
        &self.descriptor
    }

    fn is_available(&self, language: &str) -> bool {
        self.descriptor.supports(language) && self.client.is_connected()
    }

    async fn recognize(&self, clip: &AudioClip, language: &str) -> Result<Transcript, SttError> {
        let request = RecognizeRequest {
            device_id: self.client.device_id().to_string(),
            pcm: base64::engine::general_purpose::STANDARD.encode(clip.to_pcm_bytes()),
            sample_rate: clip.sample_rate,
            channels: clip.channels,
            language: language.to_string(),
        };

        let reply: RecognizeReply = self
            .client
            .request_json(&self.subject, &request, self.timeout)
            .await
            .map_err(|e| SttError::Service(format!("{:#}", e)))?;

        if let Some(error) = reply.error {
            return Err(SttError::Service(error));
        }

        Ok(Transcript {
            text: reply.text,
            confidence: reply.confidence,
        })
    }
}

pub struct NatsResponder {
    client: Arc<NatsClient>,
    subject: String,
    timeout: Duration,
}

impl NatsResponder {
    pub fn new(client: Arc<NatsClient>, subject: String, timeout: Duration) -> Self {
        Self {
            client,
            subject,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl TextResponder for NatsResponder {
    async fn generate(&self, text: &str, history: &[ConversationTurn]) -> Result<String> {
        let request = GenerateRequest {
            device_id: self.client.device_id().to_string(),
            text: text.to_string(),
            history: history
                .iter()
                .map(|turn| HistoryEntry {
                    user: turn.user.clone(),
                    assistant: turn.assistant.clone(),
                })
                .collect(),
        };

        let reply: GenerateReply = self.client.request_json(&self.subject, &request, self.timeout).await?;
        if let Some(error) = reply.error {
            bail!("Responder error: {}", error);
        }

        Ok(reply.text)
    }

    fn name(&self) -> &str {
        &self.subject
    }
}

pub struct NatsSynthesizer {
    client: Arc<NatsClient>,
    subject: String,
    timeout: Duration,
}

impl NatsSynthesizer {
    pub fn new(client: Arc<NatsClient>, subject: String, timeout: Duration) -> Self {
        Self {
            client,
            subject,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for NatsSynthesizer {
    async fn speak(&self, text: &str, language: &str) -> Result<()> {
        let request = SpeakRequest {
            device_id: self.client.device_id().to_string(),
            text: text.to_string(),
            language: language.to_string(),
        };

        let reply: SpeakReply = self.client.request_json(&self.subject, &request, self.timeout).await?;
        if !reply.ok {
            bail!("Synthesis failed: {}", reply.error.unwrap_or_else(|| "unknown error".to_string()));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.subject
    }
}
