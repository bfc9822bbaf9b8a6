use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::detector::ActivationProbe;
use super::event::ActivationEvent;

/// Raw binary proximity reading
#[async_trait::async_trait]
pub trait HandshakeSignal: Send + Sync {
    /// `true` while something is in front of the sensor
    async fn poll(&self) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Minimum time between accepted triggers
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Default)]
struct EdgeState {
    last_level: bool,
    last_trigger: Option<Instant>,
}

/// Proximity gesture detection
///
/// Each probe polls the signal once. A low-to-high transition triggers an
/// activation unless the previous trigger is younger than the debounce
/// window.
pub struct HandshakeProbe {
    signal: Arc<dyn HandshakeSignal>,
    config: HandshakeConfig,
    state: Mutex<EdgeState>,
}

impl HandshakeProbe {
    pub fn new(signal: Arc<dyn HandshakeSignal>, config: HandshakeConfig) -> Self {
        Self {
            signal,
            config,
            state: Mutex::new(EdgeState::default()),
        }
    }

    fn on_level(&self, level: bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let rising = level && !state.last_level;
        state.last_level = level;

        if !rising {
            return false;
        }

        let now = Instant::now();
        if let Some(last) = state.last_trigger {
            if now.duration_since(last) < self.config.debounce {
                debug!("Handshake edge within debounce window, ignoring");
                return false;
            }
        }

        state.last_trigger = Some(now);
        true
    }
}

#[async_trait::async_trait]
impl ActivationProbe for HandshakeProbe {
    async fn probe(&self) -> Result<Option<ActivationEvent>> {
        tokio::time::sleep(self.config.poll_interval).await;
        let level = self.signal.poll().await.context("Failed to read handshake sensor")?;

        Ok(self.on_level(level).then(ActivationEvent::handshake))
    }

    fn iteration_timeout(&self) -> Duration {
        self.config.poll_interval + Duration::from_secs(1)
    }
}

/// IR proximity sensor on a sysfs-exported GPIO line
pub struct SysfsGpioSignal {
    value_path: PathBuf,
    /// Sensor drives the line low on detection
    active_low: bool,
}

impl SysfsGpioSignal {
    /// Open `/sys/class/gpio/gpio<pin>`, exporting the pin if needed
    pub fn open(pin: u32, active_low: bool) -> Result<Self> {
        let base = PathBuf::from("/sys/class/gpio");
        let pin_dir = base.join(format!("gpio{}", pin));

        if !pin_dir.exists() {
            std::fs::write(base.join("export"), pin.to_string())
                .with_context(|| format!("Failed to export GPIO pin {}", pin))?;
        }

        // Direction may be fixed by the board overlay
        let _ = std::fs::write(pin_dir.join("direction"), "in");

        info!("Handshake sensor on GPIO {} (active {})", pin, if active_low { "low" } else { "high" });

        Ok(Self {
            value_path: pin_dir.join("value"),
            active_low,
        })
    }
}

#[async_trait::async_trait]
impl HandshakeSignal for SysfsGpioSignal {
    async fn poll(&self) -> Result<bool> {
        let raw = tokio::fs::read_to_string(&self.value_path)
            .await
            .with_context(|| format!("Failed to read {}", self.value_path.display()))?;
        let high = raw.trim() == "1";
        Ok(high != self.active_low)
    }
}
