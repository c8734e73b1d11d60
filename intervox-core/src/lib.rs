//! # intervox-core
//!
//! Reusable interview session engine.
//!
//! ## Architecture
//!
//! ```text
//!   keyboard / mic button / typed text            interview service (HTTP)
//!                 │                                        ▲   │
//!                 ▼                                        │   ▼
//!   PushToTalkController ──► SpeechInputController    AnswerSubmissionPipeline
//!                 │                 │ transcript               │ next question
//!                 └──────────► SessionController ◄─────────────┘
//!                                   │
//!                         SpeechOutputController ──► speaker
//!                                   │
//!                     broadcast::Sender<SessionEvent>
//! ```
//!
//! Everything runs on one logical event loop (`SessionController::next_event`).
//! Network and permission requests are spawned and post their results back as
//! continuations; they never touch controller state directly.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod ptt;
pub mod session;
pub mod speech;
pub mod status;
pub mod submission;

// Convenience re-exports for downstream crates
pub use api::{http::HttpInterviewApi, AnswerDraft, AnswerSource, InterviewApi, Question, StartRequest};
pub use config::{RecognitionSettings, SessionConfig, VoiceSettings};
pub use error::{InterviewError, MicError, Result};
pub use events::{MicState, SessionEvent, SessionPhase, SessionSnapshot, SessionSummary, SpeechState};
pub use ptt::{FocusTarget, KeyEvent, PushToTalkController};
pub use session::{SessionCommand, SessionController, SessionHandle};
pub use speech::{Capabilities, MicrophonePermission, SpeechRecognizer, SpeechSynthesizer};
pub use submission::{AnswerSubmissionPipeline, SubmissionGuard, SubmitOutcome};
