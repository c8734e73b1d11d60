//! `PushToTalkController` — hold-to-talk with a debounce.
//!
//! Pure state machine. It never touches the timer or the recognizer; every
//! input returns a [`PttAction`] that the session executes.
//!
//! | State | Input | Guard | Next | Action |
//! |-------|-------|-------|------|--------|
//! | Idle | key down | gate open, focus not a text field | ArmedPending | `Arm` |
//! | ArmedPending | key up | | Idle | `CancelArm` |
//! | ArmedPending | debounce elapsed | gate still open | Listening | `StartCapture` (unless already capturing) |
//! | Listening | key up | | Idle | `StopCapture` |
//!
//! Key repeat delivers extra key-downs while held; anything but Idle ignores them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifies one arming. A timer that fires for an older arm is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArmId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttState {
    Idle,
    ArmedPending(ArmId),
    Listening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttAction {
    None,
    /// Schedule `arm_elapsed(arm)` after `delay`.
    Arm { arm: ArmId, delay: Duration },
    CancelArm { arm: ArmId },
    StartCapture,
    StopCapture,
}

/// Conditions under which capture may begin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureGate {
    pub session_active: bool,
    pub speaking: bool,
    pub submitting: bool,
    /// A microphone error is latched.
    pub capture_disabled: bool,
}

impl CaptureGate {
    pub fn is_open(&self) -> bool {
        self.session_active && !self.speaking && !self.submitting && !self.capture_disabled
    }
}

/// Where keyboard focus was when the key event fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusTarget {
    /// A text-entry field; the key types a character instead.
    TextField,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    /// Key code, e.g. `"Space"`.
    pub code: String,
    pub focus: FocusTarget,
}

impl KeyEvent {
    pub fn new(code: impl Into<String>, focus: FocusTarget) -> Self {
        Self {
            code: code.into(),
            focus,
        }
    }

    pub fn space() -> Self {
        Self::new("Space", FocusTarget::Other)
    }
}

pub struct PushToTalkController {
    key: String,
    debounce: Duration,
    state: PttState,
    next_arm: u64,
}

impl PushToTalkController {
    pub fn new(key: impl Into<String>, debounce: Duration) -> Self {
        Self {
            key: key.into(),
            debounce,
            state: PttState::Idle,
            next_arm: 1,
        }
    }

    pub fn key_down(&mut self, event: &KeyEvent, gate: CaptureGate) -> PttAction {
        if event.code != self.key || self.state != PttState::Idle {
            return PttAction::None;
        }
        if event.focus == FocusTarget::TextField {
            return PttAction::None;
        }
        if !gate.is_open() {
            debug!(?gate, "push-to-talk refused");
            return PttAction::None;
        }

        let arm = ArmId(self.next_arm);
        self.next_arm += 1;
        self.state = PttState::ArmedPending(arm);
        PttAction::Arm {
            arm,
            delay: self.debounce,
        }
    }

    pub fn key_up(&mut self, event: &KeyEvent) -> PttAction {
        if event.code != self.key {
            return PttAction::None;
        }
        match std::mem::replace(&mut self.state, PttState::Idle) {
            PttState::Idle => PttAction::None,
            PttState::ArmedPending(arm) => PttAction::CancelArm { arm },
            PttState::Listening => PttAction::StopCapture,
        }
    }

    /// The debounce for `arm` ran out while the key is still held. The gate
    /// is checked again: a question may have started playing meanwhile.
    pub fn arm_elapsed(&mut self, arm: ArmId, gate: CaptureGate, capture_active: bool) -> PttAction {
        if self.state != PttState::ArmedPending(arm) {
            return PttAction::None;
        }
        if !gate.is_open() {
            debug!(?gate, "push-to-talk dropped at debounce");
            self.state = PttState::Idle;
            return PttAction::None;
        }
        self.state = PttState::Listening;
        if capture_active {
            // The mic button already opened a capture; key-up will close it.
            PttAction::None
        } else {
            PttAction::StartCapture
        }
    }

    /// Manual toggle. Bypasses the debounce and shares the capture with the key.
    pub fn mic_button(&mut self, gate: CaptureGate, capture_active: bool) -> PttAction {
        if capture_active {
            self.state = PttState::Idle;
            return PttAction::StopCapture;
        }
        if !gate.is_open() {
            debug!(?gate, "mic button refused");
            return PttAction::None;
        }
        match std::mem::replace(&mut self.state, PttState::Idle) {
            PttState::ArmedPending(arm) => {
                debug!(?arm, "mic button overrides pending arm");
            }
            PttState::Idle | PttState::Listening => {}
        }
        PttAction::StartCapture
    }

    /// Forget any press in progress.
    pub fn reset(&mut self) -> PttAction {
        match std::mem::replace(&mut self.state, PttState::Idle) {
            PttState::ArmedPending(arm) => PttAction::CancelArm { arm },
            PttState::Idle | PttState::Listening => PttAction::None,
        }
    }

    pub fn state(&self) -> PttState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, PttState::ArmedPending(_))
    }
}
