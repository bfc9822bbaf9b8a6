//! Background activation loop shared by every detector variant.
//!
//! A detector repeatedly asks its [`ActivationProbe`] for one classification
//! attempt and forwards matches to the coordinator without waiting on it.
//! Each attempt is bounded by the probe's iteration timeout, so a stop
//! request is observed within one iteration at worst.

use anyhow::Result;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event::ActivationEvent;

/// One classification attempt against a signal source
#[async_trait::async_trait]
pub trait ActivationProbe: Send + Sync {
    /// `Ok(None)` means nothing matched (including silence); `Err` is a
    /// service or device failure and counts towards the cooldown.
    async fn probe(&self) -> Result<Option<ActivationEvent>>;

    /// Upper bound for a single `probe` call
    fn iteration_timeout(&self) -> Duration;
}

/// Failure policy for the detection loop
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Consecutive failures that trigger a cooldown
    pub max_consecutive_failures: u32,
    pub failure_cooldown: Duration,
    /// Pause after a single failure
    pub error_backoff: Duration,
    /// How long `stop` waits for the loop before aborting it
    pub stop_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            failure_cooldown: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorState {
    Stopped,
    Running,
}

struct RunHandle {
    running: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct ActivationDetector {
    name: String,
    probe: Arc<dyn ActivationProbe>,
    events: mpsc::Sender<ActivationEvent>,
    config: DetectorConfig,
    run: Mutex<Option<RunHandle>>,
}

impl ActivationDetector {
    pub fn new(
        name: impl Into<String>,
        probe: Arc<dyn ActivationProbe>,
        events: mpsc::Sender<ActivationEvent>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            name: name.into(),
            probe,
            events,
            config,
            run: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DetectorState {
        match self.run().as_ref() {
            Some(handle) if !handle.task.is_finished() => DetectorState::Running,
            _ => DetectorState::Stopped,
        }
    }

    /// Spawn the detection loop; a no-op while it is already running
    pub fn start(&self) {
        let mut run = self.run();
        if let Some(handle) = run.as_ref() {
            if !handle.task.is_finished() {
                debug!(detector = %self.name, "Detector already running");
                return;
            }
        }

        let (running, rx) = watch::channel(true);
        let task = tokio::spawn(detection_loop(
            self.name.clone(),
            Arc::clone(&self.probe),
            self.events.clone(),
            self.config.clone(),
            rx,
        ));

        *run = Some(RunHandle { running, task });
    }

    /// Clear the run flag and wait for the loop to exit
    ///
    /// The loop is aborted if it does not finish within the configured
    /// stop timeout.
    pub async fn stop(&self) {
        let Some(RunHandle { running, mut task }) = self.run().take() else {
            return;
        };

        let _ = running.send(false);

        match tokio::time::timeout(self.config.stop_timeout, &mut task).await {
            Ok(Ok(())) => debug!(detector = %self.name, "Detector joined"),
            Ok(Err(e)) => warn!(detector = %self.name, "Detector task failed: {}", e),
            Err(_) => {
                warn!(detector = %self.name, "Detector did not stop in time, aborting");
                task.abort();
            }
        }
    }

    fn run(&self) -> MutexGuard<'_, Option<RunHandle>> {
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn detection_loop(
    name: String,
    probe: Arc<dyn ActivationProbe>,
    events: mpsc::Sender<ActivationEvent>,
    config: DetectorConfig,
    mut running: watch::Receiver<bool>,
) {
    info!(detector = %name, "Detector started");
    let mut failures = 0u32;

    while *running.borrow() {
        let outcome = tokio::select! {
            _ = running.wait_for(|r| !*r) => break,
            outcome = tokio::time::timeout(probe.iteration_timeout(), probe.probe()) => outcome,
        };

        let pause = match outcome {
            Err(_) => {
                debug!(detector = %name, "Iteration timed out");
                None
            }
            Ok(Ok(None)) => {
                failures = 0;
                None
            }
            Ok(Ok(Some(event))) => {
                failures = 0;
                info!(detector = %name, source = %event.source, phrase = ?event.matched_phrase, "Activation detected");
                match events.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(detector = %name, "Activation queue full, dropping event");
                    }
                    Err(TrySendError::Closed(_)) => {
                        warn!(detector = %name, "Activation channel closed, stopping");
                        break;
                    }
                }
                None
            }
            Ok(Err(e)) => {
                failures += 1;
                if failures >= config.max_consecutive_failures {
                    warn!(
                        detector = %name,
                        failures,
                        "Repeated failures, cooling down for {:?}: {:#}",
                        config.failure_cooldown,
                        e
                    );
                    failures = 0;
                    Some(config.failure_cooldown)
                } else {
                    warn!(detector = %name, failures, "Detection failed: {:#}", e);
                    Some(config.error_backoff)
                }
            }
        };

        match pause {
            Some(delay) => {
                tokio::select! {
                    _ = running.wait_for(|r| !*r) => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::task::yield_now().await,
        }
    }

    info!(detector = %name, "Detector stopped");
}
