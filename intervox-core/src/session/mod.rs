//! `SessionController` — the single event loop that owns one interview.
//!
//! ## Loop
//!
//! ```text
//!   ┌────────────── next_event() : tokio::select! ───────────────┐
//!   │ continuations (network + permission results, spawned tasks) │
//!   │ recognizer events      synthesizer events                   │
//!   │ armed push-to-talk Sleep        1 s clock Interval          │
//!   └──────────────────────────────┬──────────────────────────────┘
//!                                  ▼
//!                        dispatch(event)  ──► publish()
//!                                             snapshot + SessionEvents
//! ```
//!
//! All state lives here and is only touched from `&mut self`. I/O runs in
//! spawned tasks that post a [`Continuation`] back; a continuation that
//! arrives after `end()` is discarded.
//!
//! ## Lifecycle
//!
//! `NotStarted ─start()─► Active ─end()─► Ended`. `start()` fires once per
//! instance; `end()` is idempotent and runs the end hook exactly once.

pub mod handle;
pub mod state;

pub use handle::{SessionCommand, SessionHandle};

use std::future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::api::{AnswerDraft, AnswerSource, InterviewApi, Question};
use crate::config::SessionConfig;
use crate::error::MicError;
use crate::events::{
    MicState, NoticeLevel, SessionEvent, SessionPhase, SessionSnapshot, SessionSummary, SpeechState,
};
use crate::ptt::{ArmId, CaptureGate, KeyEvent, PttAction, PushToTalkController};
use crate::speech::input::{CaptureOutcome, SpeechInputController};
use crate::speech::output::SpeechOutputController;
use crate::speech::{
    Capabilities, CaptureId, RecognizerEvent, RecognizerEventReceiver, SynthesizerEvent,
    SynthesizerEventReceiver,
};
use crate::status::ControlStatus;
use crate::submission::{
    AnswerReply, AnswerSubmissionPipeline, Completion, OpeningReply, Submission, SubmitOutcome,
};

use self::state::Session;

const MIN_CLOCK_PERIOD: Duration = Duration::from_millis(10);

/// Invoked once when the session terminates.
pub type EndHook = Box<dyn FnOnce(&SessionSummary) + Send>;

/// Result of off-loop work, posted back to the loop.
pub enum Continuation {
    Opening(OpeningReply),
    Answer(AnswerReply),
    Permission {
        capture: CaptureId,
        result: Result<(), MicError>,
    },
}

/// One unit of work for [`SessionController::dispatch`].
pub enum LoopEvent {
    Tick,
    ArmElapsed(ArmId),
    Recognizer(RecognizerEvent),
    Synthesizer(SynthesizerEvent),
    Continuation(Continuation),
}

pub struct SessionController {
    config: SessionConfig,
    session: Session,
    started: bool,
    started_at: Option<DateTime<Utc>>,

    // ── Timers ──
    clock: Option<Interval>,
    arm_timer: Option<(ArmId, Pin<Box<Sleep>>)>,

    // ── Components ──
    ptt: PushToTalkController,
    input: SpeechInputController,
    output: SpeechOutputController,
    pipeline: AnswerSubmissionPipeline,

    // ── Inbound ──
    recognizer_events: RecognizerEventReceiver,
    synthesizer_events: SynthesizerEventReceiver,
    continuations_tx: mpsc::UnboundedSender<Continuation>,
    continuations_rx: mpsc::UnboundedReceiver<Continuation>,

    // ── Outbound ──
    on_end: Option<EndHook>,
    events_tx: broadcast::Sender<SessionEvent>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
    published: SessionSnapshot,
}

impl SessionController {
    pub fn new(config: SessionConfig, api: Arc<dyn InterviewApi>, capabilities: Capabilities) -> Self {
        let Capabilities {
            recognizer,
            recognizer_events,
            synthesizer,
            synthesizer_events,
            permission,
        } = capabilities;

        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (continuations_tx, continuations_rx) = mpsc::unbounded_channel();
        let ptt = PushToTalkController::new(config.push_to_talk_key.clone(), config.push_to_talk_debounce);
        let input = SpeechInputController::new(recognizer, permission, config.recognition.clone());
        let output = SpeechOutputController::new(synthesizer, config.voice);

        Self {
            session: Session::default(),
            started: false,
            started_at: None,
            clock: None,
            arm_timer: None,
            ptt,
            input,
            output,
            pipeline: AnswerSubmissionPipeline::new(api),
            recognizer_events,
            synthesizer_events,
            continuations_tx,
            continuations_rx,
            on_end: None,
            events_tx,
            snapshot: Arc::new(Mutex::new(SessionSnapshot::default())),
            published: SessionSnapshot::default(),
            config,
        }
    }

    pub fn with_end_hook(mut self, hook: impl FnOnce(&SessionSummary) + Send + 'static) -> Self {
        self.on_end = Some(Box::new(hook));
        self
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Activate the session: start the clock and request the opening question.
    pub fn start(&mut self) {
        if self.started || self.session.phase != SessionPhase::NotStarted {
            debug!(phase = ?self.session.phase, "start ignored");
            return;
        }
        self.started = true;
        self.session.phase = SessionPhase::Active;
        self.started_at = Some(Utc::now());

        let period = self.config.clock_period.max(MIN_CLOCK_PERIOD);
        let mut clock = time::interval_at(Instant::now() + period, period);
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.clock = Some(clock);

        info!(
            user_id = %self.config.user_id,
            job_role = %self.config.job_role,
            company = %self.config.company,
            "session started"
        );
        self.request_opening();
        self.publish();
    }

    /// Terminate the session. Stops the clock, cancels playback, releases the
    /// microphone and runs the end hook. Later calls do nothing.
    pub fn end(&mut self) {
        if self.session.phase == SessionPhase::Ended {
            return;
        }
        self.session.phase = SessionPhase::Ended;
        self.clock = None;
        self.arm_timer = None;
        self.ptt.reset();
        self.input.abort();
        self.output.stop();

        let summary = SessionSummary {
            started_at: self.started_at,
            ended_at: Utc::now(),
            elapsed_seconds: self.session.elapsed_seconds,
            questions_asked: self.session.question_index,
        };
        info!(
            elapsed_seconds = summary.elapsed_seconds,
            questions_asked = summary.questions_asked,
            "session ended"
        );
        if let Some(hook) = self.on_end.take() {
            hook(&summary);
        }
        self.publish();
    }

    /// Re-issue the opening-question request after it failed.
    ///
    /// Only valid while active, without a current question, and with no
    /// request in flight.
    pub fn retry_opening_question(&mut self) -> bool {
        if !self.session.is_active() || self.session.question.is_some() {
            return false;
        }
        let issued = self.request_opening();
        self.publish();
        issued
    }

    fn request_opening(&mut self) -> bool {
        let Some(pending) = self.pipeline.open(self.config.start_request()) else {
            debug!("opening request skipped: request in flight");
            return false;
        };
        let tx = self.continuations_tx.clone();
        tokio::spawn(async move {
            let reply = pending.send().await;
            let _ = tx.send(Continuation::Opening(reply));
        });
        true
    }

    // ── Push-to-talk + mic ───────────────────────────────────────────

    pub fn key_down(&mut self, event: &KeyEvent) {
        let action = self.ptt.key_down(event, self.gate());
        self.execute(action);
        self.publish();
    }

    pub fn key_up(&mut self, event: &KeyEvent) {
        let action = self.ptt.key_up(event);
        self.execute(action);
        self.publish();
    }

    /// The manual mic button.
    pub fn toggle_mic(&mut self) {
        let action = self.ptt.mic_button(self.gate(), self.input.is_active());
        self.execute(action);
        self.publish();
    }

    /// Clear a latched microphone error and any buffered transcript.
    pub fn reset_mic(&mut self) {
        self.input.reset();
        self.publish();
    }

    fn gate(&self) -> CaptureGate {
        CaptureGate {
            session_active: self.session.is_active(),
            speaking: self.output.state() == SpeechState::Speaking,
            submitting: self.pipeline.is_busy(),
            capture_disabled: self.input.error().is_some(),
        }
    }

    fn execute(&mut self, action: PttAction) {
        match action {
            PttAction::None => {}
            PttAction::Arm { arm, delay } => {
                self.arm_timer = Some((arm, Box::pin(time::sleep(delay))));
            }
            PttAction::CancelArm { arm } => {
                if matches!(self.arm_timer, Some((current, _)) if current == arm) {
                    self.arm_timer = None;
                }
            }
            PttAction::StartCapture => self.begin_capture(),
            PttAction::StopCapture => {
                self.input.stop();
            }
        }
    }

    /// Drop any press in progress and abort the capture, if one is open.
    fn release_mic(&mut self) {
        let action = self.ptt.reset();
        self.execute(action);
        if self.input.abort() {
            debug!("open capture aborted");
        }
    }

    fn begin_capture(&mut self) {
        let Some(request) = self.input.start() else {
            return;
        };
        let tx = self.continuations_tx.clone();
        tokio::spawn(async move {
            let (capture, result) = request.resolve().await;
            let _ = tx.send(Continuation::Permission { capture, result });
        });
    }

    // ── Answers ──────────────────────────────────────────────────────

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.pipeline.update_draft(text);
        self.publish();
    }

    /// Send the typed draft.
    pub fn submit_draft(&mut self) -> SubmitOutcome {
        let text = self.pipeline.draft_text().to_string();
        self.submit(text, AnswerSource::Typed)
    }

    pub fn submit(&mut self, text: impl Into<String>, source: AnswerSource) -> SubmitOutcome {
        let answer = AnswerDraft {
            text: text.into(),
            source,
        };
        let outcome = match self.pipeline.submit(answer, &self.session) {
            Submission::Accepted(pending) => {
                self.release_mic();
                self.input.clear_transcript();
                self.emit(SessionEvent::AnswerAccepted {
                    source: pending.source(),
                    chars: pending.text().chars().count(),
                });
                let tx = self.continuations_tx.clone();
                tokio::spawn(async move {
                    let reply = pending.send().await;
                    let _ = tx.send(Continuation::Answer(reply));
                });
                SubmitOutcome::Accepted
            }
            Submission::Rejected(outcome) => {
                debug!(?source, ?outcome, "answer not submitted");
                outcome
            }
        };
        self.publish();
        outcome
    }

    // ── Speech output ────────────────────────────────────────────────

    /// Cut the current utterance without ending the session.
    pub fn stop_speaking(&mut self) -> bool {
        let stopped = self.output.stop();
        self.publish();
        stopped
    }

    fn present(&mut self, question: Question) {
        // Never play a question into an open microphone.
        self.release_mic();
        self.emit(SessionEvent::QuestionChanged {
            question: question.clone(),
        });
        let tx = self.events_tx.clone();
        let ordinal = question.ordinal;
        self.output.speak(
            &question.text,
            Box::new(move || {
                let _ = tx.send(SessionEvent::QuestionSpoken { ordinal });
            }),
        );
    }

    // ── Event loop ───────────────────────────────────────────────────

    /// Wait for the next asynchronous event and apply it.
    pub async fn pump(&mut self) {
        let event = self.next_event().await;
        self.dispatch(event);
    }

    /// Wait for the next asynchronous event. Cancel-safe.
    pub async fn next_event(&mut self) -> LoopEvent {
        tokio::select! {
            biased;
            Some(c) = self.continuations_rx.recv() => LoopEvent::Continuation(c),
            Some(e) = self.recognizer_events.recv() => LoopEvent::Recognizer(e),
            Some(e) = self.synthesizer_events.recv() => LoopEvent::Synthesizer(e),
            arm = wait_for_arm(&mut self.arm_timer) => LoopEvent::ArmElapsed(arm),
            _ = wait_for_tick(&mut self.clock) => LoopEvent::Tick,
        }
    }

    pub fn dispatch(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Tick => {
                if self.session.is_active() {
                    self.session.elapsed_seconds += 1;
                    self.emit(SessionEvent::Tick {
                        elapsed_seconds: self.session.elapsed_seconds,
                    });
                }
            }
            LoopEvent::ArmElapsed(arm) => {
                self.arm_timer = None;
                let action = self.ptt.arm_elapsed(arm, self.gate(), self.input.is_active());
                self.execute(action);
            }
            LoopEvent::Recognizer(event) => {
                if let Some(outcome) = self.input.on_event(event) {
                    self.on_capture(outcome);
                }
            }
            LoopEvent::Synthesizer(event) => {
                self.output.on_event(event);
            }
            LoopEvent::Continuation(Continuation::Opening(reply)) => {
                match self.pipeline.complete_opening(reply, &mut self.session) {
                    Completion::Advanced(question) => self.present(question),
                    Completion::Failed(e) => self.notice(
                        NoticeLevel::Warning,
                        format!("Could not load the first question ({e}). Use retry to try again."),
                    ),
                    Completion::Stale => {}
                }
            }
            LoopEvent::Continuation(Continuation::Answer(reply)) => {
                match self.pipeline.complete(reply, &mut self.session) {
                    Completion::Advanced(question) => self.present(question),
                    Completion::Failed(e) => {
                        self.notice(NoticeLevel::Warning, format!("Failed to submit answer: {e}"))
                    }
                    Completion::Stale => {}
                }
            }
            LoopEvent::Continuation(Continuation::Permission { capture, result }) => {
                let gate = self.gate();
                if let Some(outcome) = self.input.on_permission(capture, result, gate) {
                    self.on_capture(outcome);
                }
            }
        }
        self.publish();
    }

    fn on_capture(&mut self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::Transcript(text) => {
                self.emit(SessionEvent::Transcript { text: text.clone() });
                let outcome = if self.session.is_active() {
                    self.submit(text, AnswerSource::Voice)
                } else {
                    SubmitOutcome::Inactive
                };
                if outcome != SubmitOutcome::Accepted {
                    self.input.clear_transcript();
                }
            }
            CaptureOutcome::Withheld => {
                let action = self.ptt.reset();
                self.execute(action);
            }
            CaptureOutcome::Failed(err) => {
                let action = self.ptt.reset();
                self.execute(action);
                self.notice(NoticeLevel::Error, err.to_string());
            }
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }

    fn notice(&self, level: NoticeLevel, message: String) {
        self.emit(SessionEvent::Notice { level, message });
    }

    fn mic_state(&self) -> MicState {
        if let Some(err) = self.input.error() {
            MicState::Error(err.clone())
        } else if self.input.is_listening() {
            MicState::Listening
        } else if self.ptt.is_armed() {
            MicState::ArmedPending
        } else {
            MicState::Idle
        }
    }

    /// Rebuild the snapshot and broadcast whatever derived state changed.
    fn publish(&mut self) {
        let mic = self.mic_state();
        let speech = self.output.state();
        let submitting = self.pipeline.is_busy();
        let next = SessionSnapshot {
            phase: self.session.phase,
            elapsed_seconds: self.session.elapsed_seconds,
            question_index: self.session.question_index,
            question: self.session.question.clone(),
            draft: self.pipeline.draft_text().to_string(),
            transcript: self.input.transcript().map(str::to_string),
            control: ControlStatus::derive(speech, submitting, &mic),
            mic,
            speech,
            submitting,
        };

        let prev = &self.published;
        if next.phase != prev.phase {
            self.emit(SessionEvent::PhaseChanged { phase: next.phase });
        }
        if next.submitting != prev.submitting {
            self.emit(SessionEvent::SubmissionChanged {
                in_flight: next.submitting,
            });
        }
        if next.speech != prev.speech {
            self.emit(SessionEvent::SpeechChanged { speech: next.speech });
        }
        if next.mic != prev.mic {
            self.emit(SessionEvent::MicChanged {
                mic: next.mic.clone(),
            });
        }

        *self.snapshot.lock() = next.clone();
        self.published = next;
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        self.published.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.session.phase == SessionPhase::Active {
            warn!("session controller dropped while active; end hook not run");
        }
    }
}

async fn wait_for_arm(timer: &mut Option<(ArmId, Pin<Box<Sleep>>)>) -> ArmId {
    match timer {
        Some((arm, sleep)) => {
            sleep.as_mut().await;
            *arm
        }
        None => future::pending().await,
    }
}

async fn wait_for_tick(clock: &mut Option<Interval>) {
    match clock {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::api::StartRequest;
    use crate::error::Result;
    use crate::speech::stub::{stub_capabilities, FixedPermission, StubRemotes};

    struct EchoApi;

    #[async_trait]
    impl InterviewApi for EchoApi {
        async fn start_interview(&self, _request: &StartRequest) -> Result<String> {
            Ok("Tell me about yourself".into())
        }

        async fn respond(&self, answer: &str) -> Result<String> {
            Ok(format!("Why {answer}?"))
        }
    }

    fn controller() -> (SessionController, StubRemotes) {
        let (caps, remotes) = stub_capabilities(FixedPermission::granted(), None);
        let config = SessionConfig {
            user_id: "u1".into(),
            ..SessionConfig::default()
        };
        (SessionController::new(config, Arc::new(EchoApi), caps), remotes)
    }

    #[tokio::test(start_paused = true)]
    async fn clock_ticks_once_per_period_while_active() {
        let (mut session, remotes) = controller();
        session.start();
        // Opening question, then finish playback so only ticks remain.
        session.pump().await;
        remotes.synthesizer.finish_current();
        session.pump().await;

        for _ in 0..3 {
            session.pump().await;
        }
        assert_eq!(session.snapshot().elapsed_seconds, 3);

        session.end();
        let pumped = time::timeout(Duration::from_secs(5), session.pump()).await;
        assert!(pumped.is_err(), "no events once ended");
        assert_eq!(session.snapshot().elapsed_seconds, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_single_shot() {
        let (mut session, _remotes) = controller();
        session.start();
        session.start();
        session.pump().await;
        assert_eq!(session.snapshot().question_index, 1);
        assert!(session.snapshot().is_active());
    }

    #[tokio::test]
    async fn end_before_start_fires_hook_once_and_blocks_start() {
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let (session, _remotes) = controller();
        let mut session = session.with_end_hook(move |summary| {
            assert!(summary.started_at.is_none());
            h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        session.end();
        session.end();
        session.start();
        assert_eq!(session.phase(), SessionPhase::Ended);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
