//! Exclusive, timed access to the single capture device.
//!
//! Every consumer of the microphone (wake-word detection, the conversation
//! loop) goes through [`AudioResourceArbiter`]. It behaves like a mutex with
//! timeout semantics: one holder at a time, no fairness between waiters, and
//! every wait is bounded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, AudioFrame};

const CLIP_CHANNELS: u16 = 1;

/// Capture parameters used by [`AudioResourceArbiter::listen`]
///
/// Device frames are downmixed to mono and decimated towards
/// `sample_rate` before they reach a clip.
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Sample rate of recorded clips
    pub sample_rate: u32,
    /// RMS level (i16 units) above which a frame counts as speech
    pub energy_threshold: f32,
    /// Trailing silence that ends a phrase
    pub pause: Duration,
    /// How long `listen` waits to acquire the device
    pub acquire_timeout: Duration,
    /// Frames kept from before speech onset
    pub pre_roll_frames: usize,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            energy_threshold: 300.0,
            pause: Duration::from_millis(600),
            acquire_timeout: Duration::from_secs(5),
            pre_roll_frames: 3,
        }
    }
}

/// Snapshot of the shared capture device
#[derive(Debug, Clone, Serialize)]
pub struct AudioResource {
    /// Current exclusive owner, if any
    pub holder: Option<String>,
    /// Clip format handed to recognizers
    pub sample_rate: u32,
    pub channels: u16,
    /// Name of the underlying capture backend
    pub device: String,
}

/// A captured utterance (mono 16-bit PCM)
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        Duration::from_millis(frames * 1000 / self.sample_rate as u64)
    }

    /// Little-endian PCM bytes, the format speech services expect
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

struct Lease {
    owner: String,
    _permit: OwnedSemaphorePermit,
}

pub struct AudioResourceArbiter {
    config: ArbiterConfig,
    permits: Arc<Semaphore>,
    lease: Mutex<Option<Lease>>,
    device: tokio::sync::Mutex<Box<dyn AudioBackend>>,
    device_name: String,
}

impl AudioResourceArbiter {
    pub fn new(device: Box<dyn AudioBackend>, config: ArbiterConfig) -> Self {
        let device_name = device.name().to_string();
        info!(
            "Audio arbiter owns device '{}' ({}Hz mono clips, threshold {:.0})",
            device_name, config.sample_rate, config.energy_threshold
        );

        Self {
            config,
            permits: Arc::new(Semaphore::new(1)),
            lease: Mutex::new(None),
            device: tokio::sync::Mutex::new(device),
            device_name,
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Wait up to `timeout` for exclusive ownership
    ///
    /// Returns `false` on timeout without side effects. The arbiter is not
    /// re-entrant: acquiring twice under the same owner waits like any
    /// other caller.
    pub async fn acquire(&self, owner: &str, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, Arc::clone(&self.permits).acquire_owned()).await {
            Ok(Ok(permit)) => {
                *self.lease() = Some(Lease {
                    owner: owner.to_string(),
                    _permit: permit,
                });
                debug!(owner, "Microphone acquired");
                true
            }
            Ok(Err(e)) => {
                error!(owner, "Microphone semaphore closed: {}", e);
                false
            }
            Err(_) => {
                info!(owner, holder = ?self.holder(), "Microphone acquisition timed out");
                false
            }
        }
    }

    /// Release the device if `owner` currently holds it
    pub fn release(&self, owner: &str) {
        let mut lease = self.lease();
        match lease.as_ref() {
            Some(current) if current.owner == owner => {
                *lease = None;
                debug!(owner, "Microphone released");
            }
            Some(current) => {
                warn!(owner, holder = %current.owner, "Release attempted by non-holder");
            }
            None => {
                warn!(owner, "Release attempted but microphone is not held");
            }
        }
    }

    /// Current exclusive owner, if any
    pub fn holder(&self) -> Option<String> {
        self.lease().as_ref().map(|l| l.owner.clone())
    }

    pub fn resource(&self) -> AudioResource {
        AudioResource {
            holder: self.holder(),
            sample_rate: self.config.sample_rate,
            channels: CLIP_CHANNELS,
            device: self.device_name.clone(),
        }
    }

    /// Acquire, capture one phrase, release
    ///
    /// Waits up to `timeout` for speech to start and records at most
    /// `phrase_limit` of it. Returns `None` when the device could not be
    /// acquired, nothing but silence was heard, or capture failed. The
    /// device is released on every path, including cancellation.
    pub async fn listen(&self, owner: &str, timeout: Duration, phrase_limit: Duration) -> Option<AudioClip> {
        if !self.acquire(owner, self.config.acquire_timeout).await {
            return None;
        }
        let _lease = ReleaseOnDrop { arbiter: self, owner };

        let mut device = self.device.lock().await;
        match self.capture(&mut **device, timeout, phrase_limit).await {
            Ok(Some(clip)) => {
                debug!(owner, duration_ms = clip.duration().as_millis() as u64, "Captured phrase");
                Some(clip)
            }
            Ok(None) => {
                debug!(owner, "No speech captured");
                None
            }
            Err(e) => {
                error!(owner, "Listen failed: {:#}", e);
                None
            }
        }
    }

    async fn capture(
        &self,
        device: &mut dyn AudioBackend,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<Option<AudioClip>> {
        // A previous listen may have been cancelled mid-capture
        if device.is_capturing() {
            device.stop().await.context("Failed to stop stale capture")?;
        }

        let mut rx = device.start().await.context("Failed to start capture")?;
        let clip = self.record(&mut rx, timeout, phrase_limit).await;
        drop(rx);

        if let Err(e) = device.stop().await {
            warn!("Failed to stop capture device: {:#}", e);
        }

        Ok(clip)
    }

    async fn record(
        &self,
        rx: &mut mpsc::Receiver<AudioFrame>,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Option<AudioClip> {
        let onset_deadline = Instant::now() + timeout;
        let pause_ms = self.config.pause.as_millis() as u64;
        let limit_ms = phrase_limit.as_millis() as u64;

        let mut pre_roll: VecDeque<AudioFrame> = VecDeque::with_capacity(self.config.pre_roll_frames + 1);
        let mut recorded: Vec<i16> = Vec::new();
        let mut recorded_ms = 0u64;
        let mut sample_rate = self.config.sample_rate;
        let mut speech_started: Option<Instant> = None;
        let mut silence_ms = 0u64;

        loop {
            let deadline = match speech_started {
                None => onset_deadline,
                Some(start) => start + phrase_limit,
            };

            let frame = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(frame)) => self.normalize(frame),
                Ok(None) => break,
                Err(_) => break,
            };

            let frame_ms = frame.duration_ms();
            let loud = frame.rms() >= self.config.energy_threshold;

            if speech_started.is_none() {
                if !loud {
                    pre_roll.push_back(frame);
                    if pre_roll.len() > self.config.pre_roll_frames {
                        pre_roll.pop_front();
                    }
                    continue;
                }

                speech_started = Some(Instant::now());
                sample_rate = frame.sample_rate;
                for earlier in pre_roll.drain(..) {
                    recorded_ms += earlier.duration_ms();
                    recorded.extend(earlier.samples);
                }
            } else if loud {
                silence_ms = 0;
            } else {
                silence_ms += frame_ms;
            }

            recorded_ms += frame_ms;
            recorded.extend(frame.samples);

            if silence_ms >= pause_ms || recorded_ms >= limit_ms {
                break;
            }
        }

        speech_started.map(|_| AudioClip {
            samples: recorded,
            sample_rate,
            channels: CLIP_CHANNELS,
        })
    }

    fn normalize(&self, frame: AudioFrame) -> AudioFrame {
        frame.downmix_to_mono().decimate_to(self.config.sample_rate)
    }

    fn lease(&self) -> MutexGuard<'_, Option<Lease>> {
        self.lease.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct ReleaseOnDrop<'a> {
    arbiter: &'a AudioResourceArbiter,
    owner: &'a str,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.arbiter.release(self.owner);
    }
}
