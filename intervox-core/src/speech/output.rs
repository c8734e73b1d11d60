//! `SpeechOutputController` — one current utterance, one completion callback.
//!
//! `speak()` cancels whatever is playing before starting the new utterance.
//! The callback of a cancelled utterance is dropped without running, so at
//! most one `on_done` fires per successful playback.

use tracing::{debug, error};

use crate::config::VoiceSettings;
use crate::events::SpeechState;
use crate::speech::{SpeechSynthesizer, SynthesizerEvent, UtteranceId};

pub type OnDone = Box<dyn FnOnce() + Send>;

struct Playing {
    id: UtteranceId,
    on_done: OnDone,
}

pub struct SpeechOutputController {
    synth: Box<dyn SpeechSynthesizer>,
    voice: VoiceSettings,
    current: Option<Playing>,
    next_id: u64,
}

impl SpeechOutputController {
    pub fn new(synth: Box<dyn SpeechSynthesizer>, voice: VoiceSettings) -> Self {
        Self {
            synth,
            voice,
            current: None,
            next_id: 1,
        }
    }

    /// Speak `text`, replacing any current utterance. Returns `None` when the
    /// synthesizer refused to start; the controller is then Silent.
    pub fn speak(&mut self, text: &str, on_done: OnDone) -> Option<UtteranceId> {
        if let Some(previous) = self.current.take() {
            debug!(utterance = %previous.id, "cancelling utterance for newer speak");
            self.synth.cancel();
        }

        let id = UtteranceId(self.next_id);
        self.next_id += 1;

        match self.synth.speak(id, text, &self.voice) {
            Ok(()) => {
                debug!(utterance = %id, chars = text.chars().count(), "utterance started");
                self.current = Some(Playing { id, on_done });
                Some(id)
            }
            Err(e) => {
                error!(utterance = %id, "synthesizer failed to speak: {e}");
                None
            }
        }
    }

    /// Cancel playback. Safe when idle. Returns whether an utterance was cut.
    pub fn stop(&mut self) -> bool {
        self.synth.cancel();
        match self.current.take() {
            Some(playing) => {
                debug!(utterance = %playing.id, "utterance cancelled");
                true
            }
            None => false,
        }
    }

    /// Apply a synthesizer event. Returns whether the current utterance
    /// completed (and its callback ran).
    pub fn on_event(&mut self, event: SynthesizerEvent) -> bool {
        let SynthesizerEvent::Finished(id) = event;
        match self.current.take() {
            Some(playing) if playing.id == id => {
                debug!(utterance = %id, "utterance finished");
                (playing.on_done)();
                true
            }
            other => {
                debug!(utterance = %id, "ignoring completion of stale utterance");
                self.current = other;
                false
            }
        }
    }

    pub fn state(&self) -> SpeechState {
        if self.current.is_some() {
            SpeechState::Speaking
        } else {
            SpeechState::Silent
        }
    }
}
