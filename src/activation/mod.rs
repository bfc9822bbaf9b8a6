pub mod coordinator;
pub mod detector;
pub mod event;
pub mod handshake;
pub mod wake;

pub use coordinator::{ActivationCoordinator, DetectorStatus};
pub use detector::{ActivationDetector, ActivationProbe, DetectorConfig, DetectorState};
pub use event::{ActivationEvent, ActivationSource};
pub use handshake::{HandshakeConfig, HandshakeProbe, HandshakeSignal, SysfsGpioSignal};
pub use wake::{match_wake_phrase, WakeWordConfig, WakeWordProbe, WAKE_OWNER};
