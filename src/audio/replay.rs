// File-backed capture device
//
// Replays a WAV recording as if it were a microphone. Every `start` call
// replays the file from the beginning, which makes it useful for headless
// runs and for exercising the full activation pipeline without hardware.

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::file::AudioFile;

pub struct FileBackend {
    config: AudioBackendConfig,
    frames: Arc<Vec<AudioFrame>>,
    name: String,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>, config: AudioBackendConfig) -> Result<Self> {
        let audio = AudioFile::open(path.as_ref())?;
        let frames = audio.frames(config.buffer_duration_ms);

        info!(
            "File backend ready: {} ({} frames of {}ms)",
            audio.path,
            frames.len(),
            config.buffer_duration_ms
        );

        Ok(Self {
            name: format!("file:{}", audio.path),
            config,
            frames: Arc::new(frames),
            task: None,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            bail!("Already capturing");
        }

        let (tx, rx) = mpsc::channel(100);
        let frames = Arc::clone(&self.frames);
        let pace = self
            .config
            .realtime
            .then(|| Duration::from_millis(self.config.buffer_duration_ms));

        self.task = Some(tokio::spawn(async move {
            for frame in frames.iter() {
                if tx.send(frame.clone()).await.is_err() {
                    break;
                }
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
            debug!("File replay finished");
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
