pub mod backend;
pub mod language;
pub mod selector;

pub use backend::{BackendKind, RecognitionResult, SttBackend, SttBackendDescriptor, SttError, Transcript};
pub use language::{detect_script_language, LanguageHint};
pub use selector::{Recognition, SelectorConfig, SttBackendSelector};
