//! Status-surface helpers: mic affordance label, progress, clock format.

use serde::{Deserialize, Serialize};

use crate::events::{MicState, SpeechState};

/// What the mic control should show. The first matching condition wins:
/// speaking, processing, error, recording, armed, ready.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum ControlStatus {
    Speaking,
    Processing,
    Error(String),
    Recording,
    Armed,
    #[default]
    Ready,
}

impl ControlStatus {
    pub fn derive(speech: SpeechState, submitting: bool, mic: &MicState) -> Self {
        if speech == SpeechState::Speaking {
            return ControlStatus::Speaking;
        }
        if submitting {
            return ControlStatus::Processing;
        }
        match mic {
            MicState::Error(e) => ControlStatus::Error(e.to_string()),
            MicState::Listening => ControlStatus::Recording,
            MicState::ArmedPending => ControlStatus::Armed,
            MicState::Idle => ControlStatus::Ready,
        }
    }

    /// Whether the mic control accepts input.
    pub fn disabled(&self) -> bool {
        matches!(
            self,
            ControlStatus::Speaking | ControlStatus::Processing | ControlStatus::Error(_)
        )
    }

    pub fn label(&self) -> &str {
        match self {
            ControlStatus::Speaking => "AI is speaking...",
            ControlStatus::Processing => "Processing answer...",
            ControlStatus::Error(message) => message.as_str(),
            ControlStatus::Recording => "Recording... (Release spacebar to send)",
            ControlStatus::Armed => "Hold spacebar to record",
            ControlStatus::Ready => "Hold spacebar to speak or click mic",
        }
    }
}

/// Session progress in percent: ten points per question, capped at 100.
pub fn progress_percent(question_index: u32) -> u32 {
    question_index.saturating_mul(10).min(100)
}

/// `mm:ss`, minutes not wrapped at the hour.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MicError;

    #[test]
    fn speaking_outranks_everything() {
        let status = ControlStatus::derive(
            SpeechState::Speaking,
            true,
            &MicState::Error(MicError::Network),
        );
        assert_eq!(status, ControlStatus::Speaking);
        assert!(status.disabled());
    }

    #[test]
    fn error_outranks_recording_but_not_processing() {
        let err = MicState::Error(MicError::AudioCapture);
        assert_eq!(
            ControlStatus::derive(SpeechState::Silent, true, &err),
            ControlStatus::Processing
        );
        let status = ControlStatus::derive(SpeechState::Silent, false, &err);
        assert_eq!(status.label(), "No microphone found or audio capture failed.");
        assert!(status.disabled());
    }

    #[test]
    fn idle_states_stay_enabled() {
        for (mic, expected) in [
            (MicState::Listening, ControlStatus::Recording),
            (MicState::ArmedPending, ControlStatus::Armed),
            (MicState::Idle, ControlStatus::Ready),
        ] {
            let status = ControlStatus::derive(SpeechState::Silent, false, &mic);
            assert_eq!(status, expected);
            assert!(!status.disabled());
        }
    }

    #[test]
    fn progress_caps_at_one_hundred() {
        assert_eq!(progress_percent(0), 0);
        assert_eq!(progress_percent(3), 30);
        assert_eq!(progress_percent(10), 100);
        assert_eq!(progress_percent(42), 100);
    }

    #[test]
    fn elapsed_formats_as_zero_padded_minutes_and_seconds() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(75), "01:15");
        assert_eq!(format_elapsed(3_600), "60:00");
    }
}
