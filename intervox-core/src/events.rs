//! Event types broadcast to the host.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them verbatim over whatever bus it uses (stdout, websocket, IPC).
//!
//! | Event | Emitted when |
//! |-------|--------------|
//! | `PhaseChanged` | session starts or ends |
//! | `Tick` | the session clock advances |
//! | `QuestionChanged` | a new current question is accepted |
//! | `QuestionSpoken` | playback of a question completed (not when cancelled) |
//! | `SpeechChanged` / `MicChanged` / `SubmissionChanged` | the derived state flips |
//! | `Transcript` | a capture produced its finalized transcript |
//! | `AnswerAccepted` | an answer was handed to the service |
//! | `Notice` | something the user should know about (errors, retries) |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{AnswerSource, Question};
use crate::error::MicError;
use crate::status::ControlStatus;

// ---------------------------------------------------------------------------
// State enums
// ---------------------------------------------------------------------------

/// Lifecycle of one session instance. `Ended` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    NotStarted,
    Active,
    Ended,
}

/// Microphone state as seen by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "camelCase")]
pub enum MicState {
    #[default]
    Idle,
    /// Push-to-talk key is down; capture starts once the debounce elapses.
    ArmedPending,
    Listening,
    /// A surfaced error disables capture until the mic is reset.
    Error(MicError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechState {
    #[default]
    Silent,
    Speaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Session events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    PhaseChanged { phase: SessionPhase },
    #[serde(rename_all = "camelCase")]
    Tick { elapsed_seconds: u64 },
    QuestionChanged { question: Question },
    QuestionSpoken { ordinal: u32 },
    SpeechChanged { speech: SpeechState },
    MicChanged { mic: MicState },
    #[serde(rename_all = "camelCase")]
    SubmissionChanged { in_flight: bool },
    Transcript { text: String },
    AnswerAccepted { source: AnswerSource, chars: usize },
    Notice { level: NoticeLevel, message: String },
}

// ---------------------------------------------------------------------------
// Snapshot + summary
// ---------------------------------------------------------------------------

/// Read-only copy of everything the host needs to render the session.
/// Republished after every processed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub elapsed_seconds: u64,
    pub question_index: u32,
    pub question: Option<Question>,
    /// Typed answer being edited.
    pub draft: String,
    /// Finalized voice transcript not yet handed to the pipeline.
    pub transcript: Option<String>,
    pub mic: MicState,
    pub speech: SpeechState,
    /// Whether an answer (or the opening request) is in flight.
    pub submitting: bool,
    pub control: ControlStatus,
}

impl SessionSnapshot {
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }
}

/// Handed to the end hook exactly once when the session terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    pub questions_asked: u32,
}
