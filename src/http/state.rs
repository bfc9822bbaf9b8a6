use crate::activation::ActivationCoordinator;
use crate::audio::AudioResourceArbiter;
use crate::stt::SttBackendSelector;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ActivationCoordinator>,

    /// Read for the microphone holder snapshot
    pub arbiter: Arc<AudioResourceArbiter>,

    pub selector: Arc<SttBackendSelector>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<ActivationCoordinator>,
        arbiter: Arc<AudioResourceArbiter>,
        selector: Arc<SttBackendSelector>,
    ) -> Self {
        Self {
            coordinator,
            arbiter,
            selector,
        }
    }
}
