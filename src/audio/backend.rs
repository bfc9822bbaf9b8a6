use anyhow::Result;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let per_channel = self.samples.len() as u64 / self.channels as u64;
        per_channel * 1000 / self.sample_rate as u64
    }

    /// Root-mean-square energy of the frame, in i16 units
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let s = s as f64;
                s * s
            })
            .sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }

    /// Average interleaved channels down to mono
    pub fn downmix_to_mono(self) -> AudioFrame {
        if self.channels <= 1 {
            return self;
        }

        let channels = self.channels as usize;
        let mono_samples: Vec<i16> = self
            .samples
            .chunks_exact(channels)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect();

        AudioFrame {
            samples: mono_samples,
            sample_rate: self.sample_rate,
            channels: 1,
            timestamp_ms: self.timestamp_ms,
        }
    }

    /// Downsample by decimation (takes every Nth sample)
    ///
    /// Only integer ratios are reduced; upsampling is not supported and the
    /// frame is returned unchanged.
    pub fn decimate_to(self, target_rate: u32) -> AudioFrame {
        if target_rate == 0 || self.sample_rate == target_rate {
            return self;
        }

        let ratio = self.sample_rate / target_rate;
        if ratio <= 1 {
            return self;
        }

        let channels = self.channels.max(1) as usize;
        let downsampled: Vec<i16> = self
            .samples
            .chunks_exact(channels)
            .step_by(ratio as usize)
            .flatten()
            .copied()
            .collect();

        AudioFrame {
            samples: downsampled,
            sample_rate: self.sample_rate / ratio,
            channels: self.channels,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// Configuration for audio backend
///
/// Backends deliver frames in the device's native format; the arbiter
/// converts them to the clip format.
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
    /// Pace file playback in real time instead of as fast as possible
    pub realtime: bool,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            buffer_duration_ms: 100, // 100ms buffers
            realtime: true,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal default input device (feature `microphone`)
/// - File: replay a WAV file (for testing / headless runs)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. The
    /// channel closes when the source is exhausted or the backend stops.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend based on platform and configuration
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    use super::microphone::MicrophoneBackend;
                    let backend = MicrophoneBackend::new(config)?;
                    Ok(Box::new(backend))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    let _ = config;
                    anyhow::bail!(
                        "Microphone capture requires the `microphone` feature; \
                         rebuild with --features microphone or configure a file source"
                    )
                }
            }

            AudioSource::File(path) => {
                use super::replay::FileBackend;
                let backend = FileBackend::open(&path, config)?;
                Ok(Box::new(backend))
            }
        }
    }
}

/// Audio source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Microphone input (default input device)
    Microphone,
    /// File input (for testing/headless runs)
    File(String),
}

impl AudioSource {
    /// Parse a configured source: `microphone` or a path to a WAV file
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "microphone" | "mic" => AudioSource::Microphone,
            other => AudioSource::File(other.strip_prefix("file:").unwrap_or(other).to_string()),
        }
    }
}
