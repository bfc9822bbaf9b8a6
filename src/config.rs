use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::activation::{DetectorConfig, HandshakeConfig, WakeWordConfig};
use crate::audio::{ArbiterConfig, AudioBackendConfig};
use crate::session::SessionConfig;
use crate::stt::{BackendKind, LanguageHint, SelectorConfig, SttBackendDescriptor};

/// Environment variables override file values, e.g. `SARAS__SESSION__MAX_TURNS=5`
const ENV_PREFIX: &str = "SARAS";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub wake: WakeConfig,
    pub handshake: HandshakeSettings,
    pub detector: DetectorSettings,
    pub session: SessionConfig,
    pub stt: SttConfig,
    pub nats: NatsConfig,
    pub responder: RemoteServiceConfig,
    pub speech: RemoteServiceConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    /// Identifies this device in bus messages
    pub device_id: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "saras-voice".to_string(),
            device_id: "saras-01".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".to_string(),
            port: 8470,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// `microphone` or a WAV path (`file:<path>`)
    pub source: String,
    /// Sample rate of recorded clips; clips are always mono
    pub sample_rate: u32,
    pub frame_ms: u64,
    /// RMS level that counts as speech
    pub energy_threshold: f32,
    /// Trailing silence that ends an utterance
    pub pause_ms: u64,
    pub acquire_timeout_secs: u64,
    pub pre_roll_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source: "microphone".to_string(),
            sample_rate: 16000,
            frame_ms: 100,
            energy_threshold: 300.0,
            pause_ms: 600,
            acquire_timeout_secs: 5,
            pre_roll_frames: 3,
        }
    }
}

impl AudioConfig {
    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            buffer_duration_ms: self.frame_ms,
            realtime: true,
        }
    }

    pub fn arbiter_config(&self) -> ArbiterConfig {
        ArbiterConfig {
            sample_rate: self.sample_rate,
            energy_threshold: self.energy_threshold,
            pause: Duration::from_millis(self.pause_ms),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            pre_roll_frames: self.pre_roll_frames,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    pub enabled: bool,
    pub phrases: Vec<String>,
    pub language: LanguageHint,
    pub listen_timeout_secs: u64,
    pub phrase_limit_secs: u64,
    pub iteration_timeout_secs: u64,
    /// Minimum recognizer confidence for a wake phrase (0.0-1.0)
    pub min_confidence: Option<f32>,
}

impl Default for WakeConfig {
    fn default() -> Self {
        let defaults = WakeWordConfig::default();
        Self {
            enabled: true,
            phrases: defaults.phrases,
            language: defaults.language,
            listen_timeout_secs: defaults.listen_timeout.as_secs(),
            phrase_limit_secs: defaults.phrase_limit.as_secs(),
            iteration_timeout_secs: defaults.iteration_timeout.as_secs(),
            min_confidence: defaults.min_confidence,
        }
    }
}

impl WakeConfig {
    pub fn probe_config(&self) -> WakeWordConfig {
        WakeWordConfig {
            phrases: self.phrases.clone(),
            language: self.language.clone(),
            listen_timeout: Duration::from_secs(self.listen_timeout_secs),
            phrase_limit: Duration::from_secs(self.phrase_limit_secs),
            iteration_timeout: Duration::from_secs(self.iteration_timeout_secs),
            min_confidence: self.min_confidence,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HandshakeSettings {
    pub enabled: bool,
    /// BCM pin number of the IR sensor
    pub gpio_pin: u32,
    /// Sensor output is low while an object is detected
    pub active_low: bool,
    pub debounce_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            gpio_pin: 17,
            active_low: true,
            debounce_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

impl HandshakeSettings {
    pub fn probe_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub max_consecutive_failures: u32,
    pub failure_cooldown_secs: u64,
    pub error_backoff_ms: u64,
    pub stop_timeout_secs: u64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            failure_cooldown_secs: 5,
            error_backoff_ms: 1000,
            stop_timeout_secs: 5,
        }
    }
}

impl DetectorSettings {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            max_consecutive_failures: self.max_consecutive_failures,
            failure_cooldown: Duration::from_secs(self.failure_cooldown_secs),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub preferred: Option<String>,
    pub prefer_online: bool,
    /// Order tried when the language hint is `auto`
    pub languages: Vec<String>,
    pub request_timeout_secs: u64,
    pub backends: Vec<SttBackendConfig>,
}

impl Default for SttConfig {
    fn default() -> Self {
        let defaults = SelectorConfig::default();
        Self {
            preferred: defaults.preferred,
            prefer_online: defaults.prefer_online,
            languages: defaults.languages,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            backends: Vec::new(),
        }
    }
}

impl SttConfig {
    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            preferred: self.preferred.clone(),
            prefer_online: self.prefer_online,
            languages: self.languages.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// A recognizer worker reachable on the bus
#[derive(Debug, Clone, Deserialize)]
pub struct SttBackendConfig {
    pub name: String,
    pub kind: BackendKind,
    #[serde(default)]
    pub priority: i32,
    pub languages: Vec<String>,
    /// Request subject, e.g. `stt.deepgram.recognize`
    pub subject: String,
}

impl SttBackendConfig {
    pub fn descriptor(&self) -> SttBackendDescriptor {
        SttBackendDescriptor {
            name: self.name.clone(),
            kind: self.kind,
            priority: self.priority,
            languages: self.languages.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub enabled: bool,
    pub url: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "nats://localhost:4222".to_string(),
        }
    }
}

/// A request/reply service on the bus; unset subject means the local fallback
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RemoteServiceConfig {
    pub subject: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            subject: None,
            timeout_secs: 30,
        }
    }
}

impl RemoteServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load `path` (extension optional) layered under `SARAS__*` overrides
    ///
    /// A missing file is not an error; every section has defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings.try_deserialize().context("Invalid configuration")
    }
}
