//! Single gate between activation sources and conversations.
//!
//! The coordinator is the only writer of the "session active" flag. An
//! activation that arrives while a conversation runs is dropped, never
//! queued. Detectors are stopped before a conversation starts, so the
//! assistant's own voice cannot wake it, and restarted once it has ended.

use anyhow::{bail, Result};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::detector::{ActivationDetector, ActivationProbe, DetectorConfig, DetectorState};
use super::event::ActivationEvent;
use crate::session::{ConversationSession, SessionConfig, SessionDeps, SessionEvent, SessionState, SessionStats};

const ACTIVATION_QUEUE: usize = 16;
const STATE_EVENTS: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct DetectorStatus {
    pub name: String,
    pub state: DetectorState,
}

pub struct ActivationCoordinator {
    deps: SessionDeps,
    config: SessionConfig,

    /// `true` while a conversation runs
    active: watch::Sender<bool>,

    /// Whether the presentation layer wants detectors running
    detectors_wanted: AtomicBool,
    detectors: Mutex<Vec<Arc<ActivationDetector>>>,
    /// Serializes detector start/stop decisions
    detector_control: tokio::sync::Mutex<()>,

    activation_tx: mpsc::Sender<ActivationEvent>,
    activation_rx: Mutex<Option<mpsc::Receiver<ActivationEvent>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,

    state_tx: broadcast::Sender<SessionEvent>,
    current_state: Mutex<SessionState>,
    session_cancel: Mutex<Option<Arc<AtomicBool>>>,
    session_task: Mutex<Option<JoinHandle<()>>>,
    last_session: Mutex<Option<SessionStats>>,
}

impl ActivationCoordinator {
    pub fn new(deps: SessionDeps, config: SessionConfig) -> Arc<Self> {
        let (activation_tx, activation_rx) = mpsc::channel(ACTIVATION_QUEUE);
        let (state_tx, _) = broadcast::channel(STATE_EVENTS);
        let (active, _) = watch::channel(false);

        Arc::new(Self {
            deps,
            config,
            active,
            detectors_wanted: AtomicBool::new(false),
            detectors: Mutex::new(Vec::new()),
            detector_control: tokio::sync::Mutex::new(()),
            activation_tx,
            activation_rx: Mutex::new(Some(activation_rx)),
            dispatcher: Mutex::new(None),
            state_tx,
            current_state: Mutex::new(SessionState::Idle),
            session_cancel: Mutex::new(None),
            session_task: Mutex::new(None),
            last_session: Mutex::new(None),
        })
    }

    /// Channel detectors emit into
    pub fn event_sender(&self) -> mpsc::Sender<ActivationEvent> {
        self.activation_tx.clone()
    }

    /// Register a detector fed by `probe`; it is not started
    pub fn add_detector(
        &self,
        name: &str,
        probe: Arc<dyn ActivationProbe>,
        config: DetectorConfig,
    ) -> Arc<ActivationDetector> {
        let detector = Arc::new(ActivationDetector::new(name, probe, self.event_sender(), config));
        lock(&self.detectors).push(Arc::clone(&detector));
        info!(detector = name, "Registered activation detector");
        detector
    }

    /// Forward queued activation events to [`Self::on_activation`]
    pub fn spawn_dispatcher(self: &Arc<Self>) -> Result<()> {
        let Some(mut rx) = lock(&self.activation_rx).take() else {
            bail!("Activation dispatcher already running");
        };

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                this.on_activation(event);
            }
            debug!("Activation dispatcher stopped");
        });

        *lock(&self.dispatcher) = Some(handle);
        Ok(())
    }

    /// Start a conversation unless one is already running
    ///
    /// Returns `false` when the event was dropped.
    pub fn on_activation(self: &Arc<Self>, event: ActivationEvent) -> bool {
        let won = self.active.send_if_modified(|active| {
            if *active {
                false
            } else {
                *active = true;
                true
            }
        });

        if !won {
            info!(source = %event.source, "Session already active, dropping activation");
            return false;
        }

        let session_id = Uuid::new_v4().to_string();
        let cancel = Arc::new(AtomicBool::new(false));
        *lock(&self.session_cancel) = Some(Arc::clone(&cancel));

        info!(session_id = %session_id, source = %event.source, "Activation accepted");

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_session(session_id, event, cancel).await });
        *lock(&self.session_task) = Some(handle);

        true
    }

    pub fn trigger_manual_activation(self: &Arc<Self>) -> bool {
        self.on_activation(ActivationEvent::manual())
    }

    async fn run_session(self: Arc<Self>, session_id: String, event: ActivationEvent, cancel: Arc<AtomicBool>) {
        // Clears the active flag even if the session panics or is aborted
        let mut active = ActiveGuard::new(&self.active);

        {
            let _control = self.detector_control.lock().await;
            self.stop_all_detectors().await;
        }

        let observer_self = Arc::clone(&self);
        let observer_id = session_id.clone();
        let session = ConversationSession::new(session_id.clone(), event, self.config.clone(), self.deps.clone())
            .with_observer(Box::new(move |state| observer_self.publish(&observer_id, state)))
            .with_cancel_flag(cancel);

        let stats = session.run().await;
        *lock(&self.last_session) = Some(stats);
        self.publish(&session_id, SessionState::Idle);

        // Idle before detectors run again, so their first event is accepted
        let _control = self.detector_control.lock().await;
        lock(&self.session_cancel).take();
        active.clear();
        if self.detectors_wanted.load(Ordering::SeqCst) {
            self.start_all_detectors();
        }
    }

    /// Run detectors now, or as soon as the current conversation ends
    pub async fn start_detectors(&self) {
        let _control = self.detector_control.lock().await;
        self.detectors_wanted.store(true, Ordering::SeqCst);

        if self.is_session_active() {
            info!("Session active, detectors will start when it ends");
            return;
        }
        self.start_all_detectors();
    }

    pub async fn stop_detectors(&self) {
        let _control = self.detector_control.lock().await;
        self.detectors_wanted.store(false, Ordering::SeqCst);
        self.stop_all_detectors().await;
    }

    fn start_all_detectors(&self) {
        let detectors = lock(&self.detectors).clone();
        for detector in &detectors {
            detector.start();
        }
        debug!(count = detectors.len(), "Detectors running");
    }

    async fn stop_all_detectors(&self) {
        let detectors = lock(&self.detectors).clone();
        join_all(detectors.iter().map(|d| d.stop())).await;
        debug!(count = detectors.len(), "Detectors stopped");
    }

    fn publish(&self, session_id: &str, state: SessionState) {
        *lock(&self.current_state) = state;
        // No receivers is fine
        let _ = self.state_tx.send(SessionEvent {
            session_id: session_id.to_string(),
            state,
            timestamp: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.state_tx.subscribe()
    }

    /// Invoke `callback` for every state change from now on
    pub fn on_session_state_changed<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(SessionEvent) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(event),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "State observer lagging"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn is_session_active(&self) -> bool {
        *self.active.borrow()
    }

    pub fn current_state(&self) -> SessionState {
        *lock(&self.current_state)
    }

    pub fn last_session(&self) -> Option<SessionStats> {
        lock(&self.last_session).clone()
    }

    pub fn detector_states(&self) -> Vec<DetectorStatus> {
        lock(&self.detectors)
            .iter()
            .map(|d| DetectorStatus {
                name: d.name().to_string(),
                state: d.state(),
            })
            .collect()
    }

    /// Resolve once no conversation is running
    pub async fn wait_for_idle(&self) {
        let mut rx = self.active.subscribe();
        let _ = rx.wait_for(|active| !*active).await;
    }

    /// Stop detectors, cancel the running conversation and the dispatcher
    pub async fn shutdown(&self) {
        info!("Shutting down activation coordinator");
        self.stop_detectors().await;

        if let Some(cancel) = lock(&self.session_cancel).as_ref() {
            cancel.store(true, Ordering::SeqCst);
        }

        let session = lock(&self.session_task).take();
        if let Some(mut task) = session {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("Conversation did not end in time, aborting");
                task.abort();
            }
        }

        if let Some(dispatcher) = lock(&self.dispatcher).take() {
            dispatcher.abort();
        }
    }
}

struct ActiveGuard<'a> {
    flag: &'a watch::Sender<bool>,
    armed: bool,
}

impl<'a> ActiveGuard<'a> {
    fn new(flag: &'a watch::Sender<bool>) -> Self {
        Self { flag, armed: true }
    }

    /// Clear the flag once; a later session may set it again
    fn clear(&mut self) {
        if std::mem::take(&mut self.armed) {
            self.flag.send_replace(false);
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        error!("Coordinator lock poisoned, recovering");
        poisoned.into_inner()
    })
}
