use anyhow::{anyhow, bail, Context, Result};
use async_nats::connection::State;
use async_nats::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use super::messages::SessionStateMessage;
use crate::session::SessionEvent;

/// Subject every session state change is published on
pub const SESSION_STATE_SUBJECT: &str = "voice.session.state";

pub struct NatsClient {
    client: Client,
    device_id: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, device_id: String) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client, device_id })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.client.connection_state(), State::Connected)
    }

    /// Send a JSON request and decode the JSON reply
    pub async fn request_json<Req, Resp>(&self, subject: &str, request: &Req, timeout: Duration) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;

        let reply = tokio::time::timeout(timeout, self.client.request(subject.to_string(), payload.into()))
            .await
            .map_err(|_| anyhow!("Request to {} timed out after {:?}", subject, timeout))?
            .with_context(|| format!("Request to {} failed", subject))?;

        if reply.payload.is_empty() {
            bail!("Empty reply from {}", subject);
        }

        debug!("Reply from {} ({} bytes)", subject, reply.payload.len());

        serde_json::from_slice(&reply.payload).with_context(|| format!("Invalid reply from {}", subject))
    }

    /// Fire-and-forget JSON publish
    pub async fn publish_json<T: Serialize>(&self, subject: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", subject))?;

        Ok(())
    }

    pub async fn publish_session_state(&self, event: &SessionEvent) -> Result<()> {
        let message = SessionStateMessage {
            device_id: self.device_id.clone(),
            session_id: event.session_id.clone(),
            state: event.state,
            timestamp: event.timestamp.to_rfc3339(),
        };

        self.publish_json(SESSION_STATE_SUBJECT, &message).await
    }

    /// Flush pending publishes before shutdown
    pub async fn close(&self) -> Result<()> {
        info!("Closing NATS connection");
        self.client.flush().await.context("Failed to flush NATS connection")?;
        Ok(())
    }
}
