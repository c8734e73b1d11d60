//! `SpeechInputController` — one capture at a time, one transcript per capture.
//!
//! ## Capture phases
//!
//! ```text
//!   Idle ─start()─► RequestingPermission(id) ─granted─► Starting(id)
//!                          │ denied / stop()                 │ Started
//!                          ▼                                 ▼
//!                        Idle ◄──Ended── Stopping(id) ◄── Listening(id)
//!                                            ▲   first final result / stop()
//! ```
//!
//! Permission is resolved off-loop: `start()` hands back a
//! [`PermissionRequest`] that the session spawns, and the result comes back
//! through [`SpeechInputController::on_permission`]. A result for a capture
//! that was cancelled meanwhile carries a stale id and is dropped. A grant
//! that arrives after the capture gate closed (an answer went in flight or a
//! question started playing) is withheld: the recognizer is never started.
//!
//! ## Errors
//!
//! | Recognizer code | Treatment |
//! |-----------------|-----------|
//! | `not-allowed`, `service-not-allowed` | latched `PermissionDenied` |
//! | `audio-capture` | latched `AudioCapture` |
//! | `network` | latched `Network` |
//! | `no-speech`, `aborted` | ignored |
//! | anything else | latched `Unclassified(code)` |
//!
//! A latched error refuses every `start()` until `reset()`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RecognitionSettings;
use crate::error::MicError;
use crate::ptt::CaptureGate;
use crate::speech::{CaptureId, MicrophonePermission, RecognizerEvent, SpeechRecognizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    RequestingPermission(CaptureId),
    Starting(CaptureId),
    Listening(CaptureId),
    Stopping(CaptureId),
}

impl CapturePhase {
    fn id(self) -> Option<CaptureId> {
        match self {
            CapturePhase::Idle => None,
            CapturePhase::RequestingPermission(id)
            | CapturePhase::Starting(id)
            | CapturePhase::Listening(id)
            | CapturePhase::Stopping(id) => Some(id),
        }
    }
}

/// How a recognizer error code is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Surfaced(MicError),
}

pub fn classify_error(code: &str) -> ErrorClass {
    match code {
        "not-allowed" | "service-not-allowed" => ErrorClass::Surfaced(MicError::PermissionDenied),
        "audio-capture" => ErrorClass::Surfaced(MicError::AudioCapture),
        "network" => ErrorClass::Surfaced(MicError::Network),
        "no-speech" | "aborted" => ErrorClass::Transient,
        other => ErrorClass::Surfaced(MicError::Unclassified(other.to_string())),
    }
}

/// Something the session must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// First finalized result of the capture, trimmed.
    Transcript(String),
    /// A surfaced error was latched.
    Failed(MicError),
    /// Permission was granted after the capture gate closed.
    Withheld,
}

/// Pending microphone permission prompt for one capture.
pub struct PermissionRequest {
    pub capture: CaptureId,
    permission: Arc<dyn MicrophonePermission>,
}

impl PermissionRequest {
    pub async fn resolve(self) -> (CaptureId, Result<(), MicError>) {
        let result = self.permission.request().await;
        (self.capture, result)
    }
}

pub struct SpeechInputController {
    recognizer: Box<dyn SpeechRecognizer>,
    permission: Arc<dyn MicrophonePermission>,
    settings: RecognitionSettings,
    phase: CapturePhase,
    transcript: Option<String>,
    error: Option<MicError>,
    next_capture: u64,
}

impl SpeechInputController {
    pub fn new(
        recognizer: Box<dyn SpeechRecognizer>,
        permission: Arc<dyn MicrophonePermission>,
        settings: RecognitionSettings,
    ) -> Self {
        Self {
            recognizer,
            permission,
            settings,
            phase: CapturePhase::Idle,
            transcript: None,
            error: None,
            next_capture: 1,
        }
    }

    /// Begin a capture by asking for microphone permission.
    ///
    /// Returns `None` (and changes nothing) while an error is latched or a
    /// capture is already active.
    pub fn start(&mut self) -> Option<PermissionRequest> {
        if let Some(err) = &self.error {
            debug!(error = %err, "capture refused: error latched");
            return None;
        }
        if self.is_active() {
            debug!(phase = ?self.phase, "capture already active");
            return None;
        }

        let capture = CaptureId(self.next_capture);
        self.next_capture += 1;
        self.phase = CapturePhase::RequestingPermission(capture);
        debug!(%capture, "requesting microphone permission");
        Some(PermissionRequest {
            capture,
            permission: Arc::clone(&self.permission),
        })
    }

    /// Apply the outcome of a permission prompt. `gate` is the capture gate
    /// as of now, not as of `start()`.
    pub fn on_permission(
        &mut self,
        capture: CaptureId,
        result: Result<(), MicError>,
        gate: CaptureGate,
    ) -> Option<CaptureOutcome> {
        if self.phase != CapturePhase::RequestingPermission(capture) {
            debug!(%capture, phase = ?self.phase, "discarding stale permission result");
            return None;
        }

        if let Err(err) = result {
            warn!(%capture, "microphone permission refused: {err}");
            return Some(self.latch(err));
        }
        if !gate.is_open() {
            info!(%capture, ?gate, "capture withheld: gate closed while permission was pending");
            self.phase = CapturePhase::Idle;
            return Some(CaptureOutcome::Withheld);
        }

        self.transcript = None;
        self.error = None;
        if let Err(e) = self.recognizer.start(&self.settings) {
            warn!(%capture, "recognizer failed to start: {e}");
            return Some(self.latch(MicError::Unavailable(e.to_string())));
        }
        self.phase = CapturePhase::Starting(capture);
        info!(%capture, language = %self.settings.language, "capture starting");
        None
    }

    /// Finish the capture gracefully. Cancels a pending permission prompt.
    pub fn stop(&mut self) -> bool {
        match self.phase {
            CapturePhase::RequestingPermission(capture) => {
                debug!(%capture, "capture cancelled before permission resolved");
                self.phase = CapturePhase::Idle;
                true
            }
            CapturePhase::Starting(capture) | CapturePhase::Listening(capture) => {
                debug!(%capture, "stopping capture");
                self.recognizer.stop();
                self.phase = CapturePhase::Stopping(capture);
                true
            }
            CapturePhase::Stopping(_) | CapturePhase::Idle => false,
        }
    }

    /// Drop the capture immediately, discarding pending audio.
    pub fn abort(&mut self) -> bool {
        match self.phase {
            CapturePhase::Idle => false,
            CapturePhase::RequestingPermission(_) => {
                self.phase = CapturePhase::Idle;
                true
            }
            CapturePhase::Starting(capture)
            | CapturePhase::Listening(capture)
            | CapturePhase::Stopping(capture) => {
                debug!(%capture, "aborting capture");
                self.recognizer.abort();
                self.phase = CapturePhase::Stopping(capture);
                true
            }
        }
    }

    /// Clear the buffered transcript and any latched error.
    pub fn reset(&mut self) {
        if self.error.take().is_some() {
            info!("microphone error cleared");
        }
        self.transcript = None;
    }

    pub fn clear_transcript(&mut self) {
        self.transcript = None;
    }

    pub fn on_event(&mut self, event: RecognizerEvent) -> Option<CaptureOutcome> {
        match event {
            RecognizerEvent::Started => {
                if let CapturePhase::Starting(capture) = self.phase {
                    debug!(%capture, "capture listening");
                    self.phase = CapturePhase::Listening(capture);
                }
                None
            }
            RecognizerEvent::Result { text, is_final } => self.on_result(text, is_final),
            RecognizerEvent::Error { code } => self.on_error(&code),
            RecognizerEvent::Ended => {
                match self.phase {
                    CapturePhase::Starting(capture)
                    | CapturePhase::Listening(capture)
                    | CapturePhase::Stopping(capture) => {
                        debug!(%capture, "capture ended");
                        self.phase = CapturePhase::Idle;
                    }
                    // The recognizer has not been started for this capture yet.
                    CapturePhase::RequestingPermission(_) | CapturePhase::Idle => {}
                }
                None
            }
        }
    }

    fn on_result(&mut self, text: String, is_final: bool) -> Option<CaptureOutcome> {
        let capture = match self.phase {
            CapturePhase::Starting(id) | CapturePhase::Listening(id) => id,
            _ => {
                debug!(phase = ?self.phase, "ignoring result outside an open capture");
                return None;
            }
        };
        if !is_final {
            debug!(%capture, interim = %text, "interim result");
            return None;
        }
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        info!(%capture, chars = text.chars().count(), "final transcript");
        self.transcript = Some(text.to_string());
        self.recognizer.stop();
        self.phase = CapturePhase::Stopping(capture);
        Some(CaptureOutcome::Transcript(text.to_string()))
    }

    fn on_error(&mut self, code: &str) -> Option<CaptureOutcome> {
        let Some(capture) = self.phase.id() else {
            debug!(code, "ignoring recognizer error while idle");
            return None;
        };
        if matches!(self.phase, CapturePhase::RequestingPermission(_)) {
            debug!(%capture, code, "ignoring recognizer error before start");
            return None;
        }
        match classify_error(code) {
            ErrorClass::Transient => {
                debug!(%capture, code, "transient recognizer error");
                None
            }
            ErrorClass::Surfaced(err) => {
                warn!(%capture, code, "recognizer error: {err}");
                Some(self.latch(err))
            }
        }
    }

    fn latch(&mut self, err: MicError) -> CaptureOutcome {
        self.error = Some(err.clone());
        self.phase = CapturePhase::Idle;
        CaptureOutcome::Failed(err)
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    /// Any phase but Idle.
    pub fn is_active(&self) -> bool {
        self.phase != CapturePhase::Idle
    }

    /// Capture requested or running and not yet winding down.
    pub fn is_listening(&self) -> bool {
        matches!(
            self.phase,
            CapturePhase::RequestingPermission(_)
                | CapturePhase::Starting(_)
                | CapturePhase::Listening(_)
        )
    }

    pub fn error(&self) -> Option<&MicError> {
        self.error.as_ref()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }
}
