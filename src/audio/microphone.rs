// Microphone capture via cpal
//
// cpal streams are not `Send` on every platform, so each capture runs on a
// dedicated OS thread that owns the stream. Samples are converted to i16,
// grouped into `buffer_duration_ms` frames and forwarded over a tokio channel.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    device_name: String,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneBackend {
    /// Open the default input device
    ///
    /// Fails when the host has no input device at all, which is a fatal
    /// startup condition for the assistant.
    pub fn new(config: AudioBackendConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No audio input device available"))?;
        let device_name = device.name().unwrap_or_else(|_| "default input".to_string());

        let supported = device
            .default_input_config()
            .context("Failed to query default input config")?;

        info!(
            "Microphone backend initialized: {} ({}Hz, {} channels, {}ms frames)",
            device_name,
            supported.sample_rate().0,
            supported.channels(),
            config.buffer_duration_ms
        );

        Ok(Self {
            config,
            device_name,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            bail!("Already capturing");
        }

        let (tx, rx) = mpsc::channel(100);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let stop_flag = Arc::new(AtomicBool::new(false));
        self.stop_flag = Arc::clone(&stop_flag);
        let buffer_ms = self.config.buffer_duration_ms;

        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_thread(tx, ready_tx, stop_flag, buffer_ms))
            .context("Failed to spawn capture thread")?;
        self.thread = Some(thread);

        ready_rx
            .await
            .map_err(|_| anyhow!("Capture thread exited before reporting status"))??;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || {
                if thread.join().is_err() {
                    error!("Capture thread panicked");
                }
            })
            .await
            .context("Failed to join capture thread")?;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

fn capture_thread(
    tx: mpsc::Sender<AudioFrame>,
    ready: oneshot::Sender<Result<()>>,
    stop_flag: Arc<AtomicBool>,
    buffer_ms: u64,
) {
    let stream = match build_stream(tx, buffer_ms) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(anyhow!("Failed to start input stream: {}", e)));
        return;
    }
    let _ = ready.send(Ok(()));

    while !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
}

fn build_stream(tx: mpsc::Sender<AudioFrame>, buffer_ms: u64) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No audio input device available"))?;
    let supported = device.default_input_config()?;
    let sample_format = supported.sample_format();
    let stream_config: StreamConfig = supported.into();

    let mut framer = Framer::new(tx, stream_config.sample_rate.0, stream_config.channels, buffer_ms);
    let err_fn = |err: cpal::StreamError| warn!("Input stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| framer.push(data.iter().copied()),
            err_fn,
            None,
        )?,
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                framer.push(data.iter().map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            },
            err_fn,
            None,
        )?,
        other => bail!("Unsupported input sample format: {:?}", other),
    };

    Ok(stream)
}

/// Groups callback samples into fixed-duration frames
struct Framer {
    tx: mpsc::Sender<AudioFrame>,
    sample_rate: u32,
    channels: u16,
    per_frame: usize,
    pending: Vec<i16>,
    started: Instant,
}

impl Framer {
    fn new(tx: mpsc::Sender<AudioFrame>, sample_rate: u32, channels: u16, buffer_ms: u64) -> Self {
        let per_frame = (sample_rate as u64 * channels as u64 * buffer_ms / 1000).max(1) as usize;
        Self {
            tx,
            sample_rate,
            channels,
            per_frame,
            pending: Vec::with_capacity(per_frame),
            started: Instant::now(),
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = i16>) {
        for sample in samples {
            self.pending.push(sample);
            if self.pending.len() >= self.per_frame {
                let frame = AudioFrame {
                    samples: std::mem::replace(&mut self.pending, Vec::with_capacity(self.per_frame)),
                    sample_rate: self.sample_rate,
                    channels: self.channels,
                    timestamp_ms: self.started.elapsed().as_millis() as u64,
                };
                // Receiver not listening or lagging: drop the frame rather than block the audio thread
                let _ = self.tx.try_send(frame);
            }
        }
    }
}
