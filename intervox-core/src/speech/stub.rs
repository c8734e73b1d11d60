//! Scripted speech capabilities.
//!
//! Used by tests and by the console host, which has no audio device. Each
//! capability is paired with a cloneable remote that scripts its events and
//! reports what the session asked of it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::{RecognitionSettings, VoiceSettings};
use crate::error::{InterviewError, MicError, Result};
use crate::speech::{
    Capabilities, MicrophonePermission, RecognizerEvent, RecognizerEventReceiver,
    RecognizerEventSender, SpeechRecognizer, SpeechSynthesizer, SynthesizerEvent,
    SynthesizerEventReceiver, SynthesizerEventSender, UtteranceId,
};

// ── Recognizer ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RecognizerLog {
    starts: usize,
    stops: usize,
    aborts: usize,
    running: bool,
    fail_next_start: bool,
    last_settings: Option<RecognitionSettings>,
}

/// Recognizer that only produces what its [`RecognizerRemote`] scripts.
pub struct ScriptedRecognizer {
    events: RecognizerEventSender,
    log: Arc<Mutex<RecognizerLog>>,
}

#[derive(Clone)]
pub struct RecognizerRemote {
    events: RecognizerEventSender,
    log: Arc<Mutex<RecognizerLog>>,
}

impl ScriptedRecognizer {
    pub fn new() -> (Self, RecognizerRemote, RecognizerEventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(RecognizerLog::default()));
        let remote = RecognizerRemote {
            events: tx.clone(),
            log: Arc::clone(&log),
        };
        (Self { events: tx, log }, remote, rx)
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&mut self, settings: &RecognitionSettings) -> Result<()> {
        let mut log = self.log.lock();
        if std::mem::take(&mut log.fail_next_start) {
            return Err(InterviewError::Capability(
                "speech recognition not supported".into(),
            ));
        }
        log.starts += 1;
        log.running = true;
        log.last_settings = Some(settings.clone());
        let _ = self.events.send(RecognizerEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.log.lock();
        log.stops += 1;
        if std::mem::take(&mut log.running) {
            let _ = self.events.send(RecognizerEvent::Ended);
        }
    }

    fn abort(&mut self) {
        let mut log = self.log.lock();
        log.aborts += 1;
        if std::mem::take(&mut log.running) {
            let _ = self.events.send(RecognizerEvent::Error {
                code: "aborted".into(),
            });
            let _ = self.events.send(RecognizerEvent::Ended);
        }
    }
}

impl RecognizerRemote {
    pub fn send(&self, event: RecognizerEvent) {
        let _ = self.events.send(event);
    }

    /// Emit an interim hypothesis followed by the final result.
    pub fn dictate(&self, text: &str) {
        if let Some(first) = text.split_whitespace().next() {
            self.send(RecognizerEvent::Result {
                text: first.to_string(),
                is_final: false,
            });
        }
        self.send(RecognizerEvent::Result {
            text: text.to_string(),
            is_final: true,
        });
    }

    /// Emit a recognizer error in wire form, then end the capture.
    pub fn fail(&self, code: &str) {
        self.log.lock().running = false;
        self.send(RecognizerEvent::Error { code: code.into() });
        self.send(RecognizerEvent::Ended);
    }

    pub fn fail_next_start(&self) {
        self.log.lock().fail_next_start = true;
    }

    pub fn starts(&self) -> usize {
        self.log.lock().starts
    }

    pub fn stops(&self) -> usize {
        self.log.lock().stops
    }

    pub fn aborts(&self) -> usize {
        self.log.lock().aborts
    }

    pub fn is_running(&self) -> bool {
        self.log.lock().running
    }

    pub fn last_settings(&self) -> Option<RecognitionSettings> {
        self.log.lock().last_settings.clone()
    }
}

// ── Synthesizer ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SynthesizerLog {
    spoken: Vec<(UtteranceId, String)>,
    cancels: usize,
    current: Option<UtteranceId>,
}

/// Synthesizer that "plays" nothing. Playback ends when the remote says so,
/// or after `per_word × words` when auto-finish is enabled.
pub struct StubSynthesizer {
    events: SynthesizerEventSender,
    log: Arc<Mutex<SynthesizerLog>>,
    per_word: Option<Duration>,
}

#[derive(Clone)]
pub struct SynthesizerRemote {
    events: SynthesizerEventSender,
    log: Arc<Mutex<SynthesizerLog>>,
}

impl StubSynthesizer {
    pub fn new() -> (Self, SynthesizerRemote, SynthesizerEventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(SynthesizerLog::default()));
        let remote = SynthesizerRemote {
            events: tx.clone(),
            log: Arc::clone(&log),
        };
        (
            Self {
                events: tx,
                log,
                per_word: None,
            },
            remote,
            rx,
        )
    }

    /// Finish each utterance on its own after `per_word` per word.
    /// Requires a running tokio runtime when `speak` is called.
    pub fn with_auto_finish(mut self, per_word: Duration) -> Self {
        self.per_word = Some(per_word);
        self
    }
}

impl SpeechSynthesizer for StubSynthesizer {
    fn speak(&mut self, id: UtteranceId, text: &str, _voice: &VoiceSettings) -> Result<()> {
        {
            let mut log = self.log.lock();
            log.spoken.push((id, text.to_string()));
            log.current = Some(id);
        }

        if let Some(per_word) = self.per_word {
            let words = text.split_whitespace().count().max(1) as u32;
            let events = self.events.clone();
            let log = Arc::clone(&self.log);
            tokio::spawn(async move {
                tokio::time::sleep(per_word * words).await;
                let still_current = {
                    let mut log = log.lock();
                    if log.current == Some(id) {
                        log.current = None;
                        true
                    } else {
                        false
                    }
                };
                if still_current {
                    let _ = events.send(SynthesizerEvent::Finished(id));
                }
            });
        }
        Ok(())
    }

    fn cancel(&mut self) {
        let mut log = self.log.lock();
        log.cancels += 1;
        log.current = None;
    }
}

impl SynthesizerRemote {
    /// Complete the utterance currently playing, if any.
    pub fn finish_current(&self) -> Option<UtteranceId> {
        let id = self.log.lock().current.take()?;
        let _ = self.events.send(SynthesizerEvent::Finished(id));
        Some(id)
    }

    /// Send a completion for `id` regardless of what is playing.
    pub fn complete(&self, id: UtteranceId) {
        let _ = self.events.send(SynthesizerEvent::Finished(id));
    }

    pub fn spoken(&self) -> Vec<String> {
        self.log.lock().spoken.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn last_spoken(&self) -> Option<String> {
        self.log.lock().spoken.last().map(|(_, t)| t.clone())
    }

    pub fn cancels(&self) -> usize {
        self.log.lock().cancels
    }

    pub fn current(&self) -> Option<UtteranceId> {
        self.log.lock().current
    }
}

// ── Permission ───────────────────────────────────────────────────────

/// Permission prompt with a fixed answer.
pub struct FixedPermission {
    outcome: std::result::Result<(), MicError>,
    requests: AtomicUsize,
}

impl FixedPermission {
    pub fn granted() -> Self {
        Self::with_outcome(Ok(()))
    }

    pub fn denied() -> Self {
        Self::with_outcome(Err(MicError::PermissionDenied))
    }

    pub fn with_outcome(outcome: std::result::Result<(), MicError>) -> Self {
        Self {
            outcome,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MicrophonePermission for FixedPermission {
    async fn request(&self) -> std::result::Result<(), MicError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

// ── Bundle ───────────────────────────────────────────────────────────

/// Remotes for a [`stub_capabilities`] bundle.
#[derive(Clone)]
pub struct StubRemotes {
    pub recognizer: RecognizerRemote,
    pub synthesizer: SynthesizerRemote,
    pub permission: Arc<FixedPermission>,
}

/// A complete scripted capability set.
pub fn stub_capabilities(
    permission: FixedPermission,
    auto_finish: Option<Duration>,
) -> (Capabilities, StubRemotes) {
    let (recognizer, recognizer_remote, recognizer_events) = ScriptedRecognizer::new();
    let (mut synthesizer, synthesizer_remote, synthesizer_events) = StubSynthesizer::new();
    if let Some(per_word) = auto_finish {
        synthesizer = synthesizer.with_auto_finish(per_word);
    }
    let permission = Arc::new(permission);

    let capabilities = Capabilities {
        recognizer: Box::new(recognizer),
        recognizer_events,
        synthesizer: Box::new(synthesizer),
        synthesizer_events,
        permission: Arc::clone(&permission) as Arc<dyn MicrophonePermission>,
    };
    let remotes = StubRemotes {
        recognizer: recognizer_remote,
        synthesizer: synthesizer_remote,
        permission,
    };
    (capabilities, remotes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_reports_aborted_then_ended() {
        let (mut recognizer, remote, mut events) = ScriptedRecognizer::new();
        recognizer
            .start(&RecognitionSettings::default())
            .expect("scripted start");
        recognizer.abort();

        assert_eq!(events.try_recv().ok(), Some(RecognizerEvent::Started));
        assert_eq!(
            events.try_recv().ok(),
            Some(RecognizerEvent::Error {
                code: "aborted".into()
            })
        );
        assert_eq!(events.try_recv().ok(), Some(RecognizerEvent::Ended));
        assert_eq!(remote.aborts(), 1);
        assert!(!remote.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_finish_skips_cancelled_utterances() {
        let (synth, remote, mut events) = StubSynthesizer::new();
        let mut synth = synth.with_auto_finish(Duration::from_millis(100));
        let voice = VoiceSettings::default();

        synth.speak(UtteranceId(1), "one two", &voice).expect("speak");
        synth.cancel();
        synth.speak(UtteranceId(2), "three", &voice).expect("speak");

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("completion should arrive")
            .expect("channel open");
        assert_eq!(event, SynthesizerEvent::Finished(UtteranceId(2)));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(events.try_recv().is_err());
        assert_eq!(remote.spoken(), vec!["one two".to_string(), "three".to_string()]);
    }
}
