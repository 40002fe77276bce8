//! Error taxonomy for the synthesis engine.
//!
//! Only fatal conditions surface here. Unknown pitch names, redundant stops
//! and out-of-range levels are absorbed where they happen.

/// Failures surfaced to whoever constructs or drives the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),
    #[error("Catalog parse error: {0}")]
    Catalog(#[from] serde_json::Error),
    #[error("Unknown percussion sound '{0}'")]
    UnknownPercussion(String),
    #[error("Audio device error: {0}")]
    Device(String),
}

/// Low-level voice teardown failure. Never leaves the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("voice already stopped")]
    AlreadyStopped,
}
