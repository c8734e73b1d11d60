//! Session configuration.

use std::time::Duration;

use crate::api::StartRequest;

/// Event broadcast capacity: 256 session events buffered for slow consumers.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for `SessionController`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Candidate identifier used in the opening-question path.
    pub user_id: String,
    /// Role the candidate is interviewing for.
    pub job_role: String,
    /// Company the candidate is interviewing with.
    pub company: String,
    /// Key code that acts as push-to-talk. Default: `"Space"`.
    pub push_to_talk_key: String,
    /// Hold time before a push-to-talk press starts capture. Short taps
    /// released within this window never open the microphone. Default: 100 ms.
    pub push_to_talk_debounce: Duration,
    /// Session clock resolution. Default: 1 s.
    pub clock_period: Duration,
    /// Voice used when speaking questions.
    pub voice: VoiceSettings,
    /// Recognizer options passed on every capture start.
    pub recognition: RecognitionSettings,
    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            job_role: String::new(),
            company: String::new(),
            push_to_talk_key: "Space".into(),
            push_to_talk_debounce: Duration::from_millis(100),
            clock_period: Duration::from_secs(1),
            voice: VoiceSettings::default(),
            recognition: RecognitionSettings::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn start_request(&self) -> StartRequest {
        StartRequest {
            user_id: self.user_id.clone(),
            job_role: self.job_role.clone(),
            company: self.company.clone(),
        }
    }
}

/// Prosody for spoken questions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    /// Speaking rate multiplier. Default: 0.9 (slightly slower than normal).
    pub rate: f32,
    pub pitch: f32,
    /// Volume in [0.0, 1.0].
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Options handed to the speech recognizer when a capture starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    /// BCP-47 language tag. Default: `"en-US"`.
    pub language: String,
    /// Keep listening across pauses instead of stopping after one phrase.
    pub continuous: bool,
    /// Request interim (non-final) hypotheses.
    pub interim_results: bool,
    pub max_alternatives: u8,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}
