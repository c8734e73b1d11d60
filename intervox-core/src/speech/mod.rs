//! Speech capabilities and the controllers that own them.
//!
//! Recognition and synthesis are provided by the host as explicitly owned
//! capability objects. Each capability reports back through its own mpsc
//! stream, consumed in arrival order by exactly one subscriber: the session
//! loop.
//!
//! ```text
//!   SpeechRecognizer ──RecognizerEvent──► SpeechInputController ─► transcript
//!   SpeechSynthesizer ─SynthesizerEvent─► SpeechOutputController ─► on_done()
//! ```

pub mod input;
pub mod output;
pub mod stub;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{RecognitionSettings, VoiceSettings};
use crate::error::{MicError, Result};

/// Identifies one `speak()` call. Completion events carrying an older id are
/// stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

/// Identifies one capture session (permission request through `Ended`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Raw callbacks from a continuous speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// Audio capture actually began.
    Started,
    Result { text: String, is_final: bool },
    /// Error code in speech-recognition wire form (`not-allowed`, `no-speech`, ...).
    Error { code: String },
    /// The recognizer stopped, for any reason.
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesizerEvent {
    /// Playback of the utterance ran to completion. Never sent for a
    /// cancelled utterance by a well-behaved synthesizer; the controller
    /// tolerates it anyway.
    Finished(UtteranceId),
}

pub type RecognizerEventSender = mpsc::UnboundedSender<RecognizerEvent>;
pub type RecognizerEventReceiver = mpsc::UnboundedReceiver<RecognizerEvent>;
pub type SynthesizerEventSender = mpsc::UnboundedSender<SynthesizerEvent>;
pub type SynthesizerEventReceiver = mpsc::UnboundedReceiver<SynthesizerEvent>;

/// Speech-to-text capability.
///
/// Implementations emit [`RecognizerEvent`]s on the channel they were built
/// with. Calls never block; results arrive as events.
pub trait SpeechRecognizer: Send + 'static {
    /// Begin a continuous capture.
    fn start(&mut self, settings: &RecognitionSettings) -> Result<()>;

    /// Finish the capture gracefully; pending audio may still produce a result.
    fn stop(&mut self);

    /// Drop the capture immediately, discarding pending audio.
    fn abort(&mut self);
}

/// Text-to-speech capability.
pub trait SpeechSynthesizer: Send + 'static {
    fn speak(&mut self, id: UtteranceId, text: &str, voice: &VoiceSettings) -> Result<()>;

    /// Cancel whatever is playing. Must be safe when idle.
    fn cancel(&mut self);
}

/// Microphone permission prompt.
#[async_trait]
pub trait MicrophonePermission: Send + Sync + 'static {
    async fn request(&self) -> std::result::Result<(), MicError>;
}

/// The capability bundle injected into a session.
pub struct Capabilities {
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub recognizer_events: RecognizerEventReceiver,
    pub synthesizer: Box<dyn SpeechSynthesizer>,
    pub synthesizer_events: SynthesizerEventReceiver,
    pub permission: Arc<dyn MicrophonePermission>,
}
