//! `AnswerSubmissionPipeline` — validate, guard, send, apply.
//!
//! ## Flow
//!
//! ```text
//!   submit(draft) ──validate──► Rejected(Empty | Inactive | NoQuestion)
//!        │
//!        ├─ guard busy ───────► Rejected(Busy)
//!        ▼
//!   Accepted(PendingAnswer) ── spawned: send().await ──► AnswerReply
//!                                                            │
//!   complete(reply) ◄──────── posted back to the loop ───────┘
//!        ├─ session no longer active ─► Stale
//!        ├─ Ok(question)              ─► Advanced
//!        └─ Err(e)                    ─► Failed (question unchanged)
//! ```
//!
//! The guard is held by an [`InFlight`] token that travels with the request
//! and back with the reply. It is released when the token drops, so every
//! exit path (success, failure, stale discard, loop gone) frees it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{AnswerDraft, AnswerSource, InterviewApi, Question, StartRequest};
use crate::error::{InterviewError, Result};
use crate::session::state::Session;

// ── Guard ────────────────────────────────────────────────────────────

/// Single in-flight request flag.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard(Arc<AtomicBool>);

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag if it was clear.
    pub fn try_acquire(&self) -> Option<InFlight> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(Arc::clone(&self.0)))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Proof of holding the guard. Dropping it clears the flag.
#[derive(Debug)]
pub struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// Empty after trimming.
    Empty,
    /// Another request is in flight.
    Busy,
    /// Session not active.
    Inactive,
    /// No question to answer yet.
    NoQuestion,
}

pub enum Submission {
    Accepted(PendingAnswer),
    Rejected(SubmitOutcome),
}

impl Submission {
    pub fn outcome(&self) -> SubmitOutcome {
        match self {
            Submission::Accepted(_) => SubmitOutcome::Accepted,
            Submission::Rejected(outcome) => *outcome,
        }
    }
}

/// Result of applying a reply to the session.
#[derive(Debug)]
pub enum Completion {
    Advanced(Question),
    /// Nothing changed; the guard is released.
    Failed(InterviewError),
    /// The session ended while the request was in flight.
    Stale,
}

// ── Requests ─────────────────────────────────────────────────────────

/// An accepted answer ready to be sent off-loop.
pub struct PendingAnswer {
    api: Arc<dyn InterviewApi>,
    text: String,
    source: AnswerSource,
    in_flight: InFlight,
}

impl PendingAnswer {
    pub fn source(&self) -> AnswerSource {
        self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub async fn send(self) -> AnswerReply {
        let result = self.api.respond(&self.text).await;
        AnswerReply {
            source: self.source,
            result,
            in_flight: self.in_flight,
        }
    }
}

pub struct AnswerReply {
    pub source: AnswerSource,
    pub result: Result<String>,
    in_flight: InFlight,
}

pub struct PendingOpening {
    api: Arc<dyn InterviewApi>,
    request: StartRequest,
    in_flight: InFlight,
}

impl PendingOpening {
    pub async fn send(self) -> OpeningReply {
        let result = self.api.start_interview(&self.request).await;
        OpeningReply {
            result,
            in_flight: self.in_flight,
        }
    }
}

pub struct OpeningReply {
    pub result: Result<String>,
    in_flight: InFlight,
}

// ── Pipeline ─────────────────────────────────────────────────────────

pub struct AnswerSubmissionPipeline {
    api: Arc<dyn InterviewApi>,
    guard: SubmissionGuard,
    draft: String,
}

impl AnswerSubmissionPipeline {
    pub fn new(api: Arc<dyn InterviewApi>) -> Self {
        Self {
            api,
            guard: SubmissionGuard::new(),
            draft: String::new(),
        }
    }

    /// Validate and claim the guard. Only `Accepted` changes anything: the
    /// typed draft is cleared before the request is even sent.
    pub fn submit(&mut self, answer: AnswerDraft, session: &Session) -> Submission {
        let text = answer.text.trim();
        if text.is_empty() {
            return Submission::Rejected(SubmitOutcome::Empty);
        }
        if !session.is_active() {
            return Submission::Rejected(SubmitOutcome::Inactive);
        }
        if session.question.is_none() {
            return Submission::Rejected(SubmitOutcome::NoQuestion);
        }
        let Some(in_flight) = self.guard.try_acquire() else {
            debug!(source = ?answer.source, "submission dropped: request in flight");
            return Submission::Rejected(SubmitOutcome::Busy);
        };

        self.clear_draft();
        info!(
            source = ?answer.source,
            question_index = session.question_index,
            chars = text.chars().count(),
            "submitting answer"
        );
        Submission::Accepted(PendingAnswer {
            api: Arc::clone(&self.api),
            text: text.to_string(),
            source: answer.source,
            in_flight,
        })
    }

    /// Claim the guard for the opening-question request.
    pub fn open(&self, request: StartRequest) -> Option<PendingOpening> {
        let in_flight = self.guard.try_acquire()?;
        Some(PendingOpening {
            api: Arc::clone(&self.api),
            request,
            in_flight,
        })
    }

    pub fn complete(&self, reply: AnswerReply, session: &mut Session) -> Completion {
        let AnswerReply {
            source,
            result,
            in_flight,
        } = reply;
        let completion = apply(result, session);
        drop(in_flight);
        match &completion {
            Completion::Advanced(q) => info!(?source, question_index = q.ordinal, "next question received"),
            Completion::Failed(e) => warn!(?source, "answer submission failed: {e}"),
            Completion::Stale => warn!(?source, "discarding answer reply: session no longer active"),
        }
        completion
    }

    pub fn complete_opening(&self, reply: OpeningReply, session: &mut Session) -> Completion {
        let OpeningReply { result, in_flight } = reply;
        let completion = apply(result, session);
        drop(in_flight);
        match &completion {
            Completion::Advanced(_) => info!("opening question received"),
            Completion::Failed(e) => warn!("opening question request failed: {e}"),
            Completion::Stale => warn!("discarding opening question: session no longer active"),
        }
        completion
    }

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn draft_text(&self) -> &str {
        &self.draft
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_set()
    }
}

fn apply(result: Result<String>, session: &mut Session) -> Completion {
    if !session.is_active() {
        return Completion::Stale;
    }
    match result {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                Completion::Failed(InterviewError::Decode("service returned an empty question".into()))
            } else {
                Completion::Advanced(session.advance(text.to_string()))
            }
        }
        Err(e) => Completion::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::events::SessionPhase;

    struct CountingApi {
        calls: AtomicUsize,
        reply: std::result::Result<&'static str, u16>,
    }

    #[async_trait]
    impl InterviewApi for CountingApi {
        async fn start_interview(&self, _request: &StartRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Tell me about yourself".into())
        }

        async fn respond(&self, _answer: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .map_err(|status| InterviewError::Http {
                    status,
                    body: "unavailable".into(),
                })
        }
    }

    fn pipeline(reply: std::result::Result<&'static str, u16>) -> (AnswerSubmissionPipeline, Arc<CountingApi>) {
        let api = Arc::new(CountingApi {
            calls: AtomicUsize::new(0),
            reply,
        });
        (
            AnswerSubmissionPipeline::new(Arc::clone(&api) as Arc<dyn InterviewApi>),
            api,
        )
    }

    fn active_session() -> Session {
        let mut session = Session {
            phase: SessionPhase::Active,
            ..Session::default()
        };
        session.advance("Tell me about yourself".into());
        session
    }

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let guard = SubmissionGuard::new();
        let held = guard.try_acquire().expect("first acquire");
        assert!(guard.is_set());
        assert!(guard.try_acquire().is_none());
        drop(held);
        assert!(!guard.is_set());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn whitespace_answer_is_rejected_without_touching_guard_or_draft() {
        let (mut pipeline, api) = pipeline(Ok("next"));
        pipeline.update_draft("keep me");
        let session = active_session();

        let outcome = pipeline.submit(AnswerDraft::typed("  \n\t "), &session).outcome();
        assert_eq!(outcome, SubmitOutcome::Empty);
        assert!(!pipeline.is_busy());
        assert_eq!(pipeline.draft_text(), "keep me");
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejects_inactive_and_questionless_sessions() {
        let (mut pipeline, _api) = pipeline(Ok("next"));
        let mut session = Session::default();
        assert_eq!(
            pipeline.submit(AnswerDraft::typed("hi"), &session).outcome(),
            SubmitOutcome::Inactive
        );
        session.phase = SessionPhase::Active;
        assert_eq!(
            pipeline.submit(AnswerDraft::typed("hi"), &session).outcome(),
            SubmitOutcome::NoQuestion
        );
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_dropped() {
        let (mut pipeline, api) = pipeline(Ok("What languages do you use?"));
        let mut session = active_session();

        let Submission::Accepted(first) = pipeline.submit(AnswerDraft::typed("one"), &session) else {
            panic!("first submission should be accepted");
        };
        assert_eq!(
            pipeline.submit(AnswerDraft::typed("two"), &session).outcome(),
            SubmitOutcome::Busy
        );

        let reply = first.send().await;
        assert!(pipeline.is_busy(), "guard held until the reply is applied");
        let completion = pipeline.complete(reply, &mut session);
        assert!(matches!(completion, Completion::Advanced(ref q) if q.ordinal == 2));
        assert!(!pipeline.is_busy());
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn accepted_answer_clears_draft_before_reply() {
        let (mut pipeline, _api) = pipeline(Ok("next"));
        let session = active_session();
        pipeline.update_draft("I am a developer");

        let draft = AnswerDraft::typed(pipeline.draft_text());
        let submission = pipeline.submit(draft, &session);
        assert_eq!(submission.outcome(), SubmitOutcome::Accepted);
        assert_eq!(pipeline.draft_text(), "");
    }

    #[tokio::test]
    async fn failure_keeps_question_and_releases_guard() {
        let (mut pipeline, _api) = pipeline(Err(503));
        let mut session = active_session();

        let Submission::Accepted(pending) = pipeline.submit(AnswerDraft::voice("answer"), &session) else {
            panic!("submission should be accepted");
        };
        let completion = pipeline.complete(pending.send().await, &mut session);
        assert!(matches!(
            completion,
            Completion::Failed(InterviewError::Http { status: 503, .. })
        ));
        assert_eq!(session.question_index, 1);
        assert_eq!(
            session.question.as_ref().map(|q| q.text.as_str()),
            Some("Tell me about yourself")
        );
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn reply_after_end_is_stale() {
        let (mut pipeline, _api) = pipeline(Ok("next"));
        let mut session = active_session();

        let Submission::Accepted(pending) = pipeline.submit(AnswerDraft::typed("answer"), &session) else {
            panic!("submission should be accepted");
        };
        let reply = pending.send().await;
        session.phase = SessionPhase::Ended;
        assert!(matches!(pipeline.complete(reply, &mut session), Completion::Stale));
        assert_eq!(session.question_index, 1);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn opening_request_holds_the_guard() {
        let (mut pipeline, _api) = pipeline(Ok("next"));
        let mut session = Session {
            phase: SessionPhase::Active,
            ..Session::default()
        };

        let opening = pipeline
            .open(StartRequest {
                user_id: "u1".into(),
                job_role: "Engineer".into(),
                company: "Acme".into(),
            })
            .expect("guard free");
        assert!(pipeline.is_busy());

        let reply = opening.send().await;
        let completion = pipeline.complete_opening(reply, &mut session);
        assert!(matches!(completion, Completion::Advanced(ref q) if q.ordinal == 1));
        assert!(!pipeline.is_busy());
        assert_eq!(
            pipeline.submit(AnswerDraft::typed("hello"), &session).outcome(),
            SubmitOutcome::Accepted
        );
    }
}
