use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by intervox-core.
#[derive(Debug, Error)]
pub enum InterviewError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("interview service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed service response: {0}")]
    Decode(String),

    #[error("speech capability error: {0}")]
    Capability(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("session loop is no longer running")]
    LoopClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, InterviewError>;

/// Microphone / recognition failures that reach the user.
///
/// Once one of these is recorded the mic affordance stays disabled until an
/// explicit reset. Messages are the strings shown on the status surface.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum MicError {
    #[error("Microphone access denied. Please allow microphone permissions.")]
    PermissionDenied,

    #[error("No microphone found or audio capture failed.")]
    AudioCapture,

    #[error("Network error occurred during speech recognition.")]
    Network,

    #[error("Speech recognition unavailable: {0}")]
    Unavailable(String),

    #[error("Speech recognition error: {0}")]
    Unclassified(String),
}
