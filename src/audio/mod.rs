pub mod arbiter;
pub mod backend;
pub mod file;
pub mod replay;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use arbiter::{ArbiterConfig, AudioClip, AudioResource, AudioResourceArbiter};
pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::AudioFile;
pub use replay::FileBackend;
