//! Interview service abstraction.
//!
//! The `InterviewApi` trait decouples the session from the transport. The
//! production implementation is [`http::HttpInterviewApi`]; tests substitute
//! scripted fakes.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The question currently put to the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    /// 1-based position in the session. The opening question is 1.
    pub ordinal: u32,
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Voice,
    Typed,
}

/// An answer waiting to be handed to the submission pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerDraft {
    pub text: String,
    pub source: AnswerSource,
}

impl AnswerDraft {
    pub fn typed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: AnswerSource::Typed,
        }
    }

    pub fn voice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: AnswerSource::Voice,
        }
    }
}

/// Parameters of the opening-question request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub user_id: String,
    pub job_role: String,
    pub company: String,
}

/// Contract for the remote interviewer.
#[async_trait]
pub trait InterviewApi: Send + Sync + 'static {
    /// Open the interview and return the first question as plain text.
    async fn start_interview(&self, request: &StartRequest) -> Result<String>;

    /// Send one answer and return the next question.
    async fn respond(&self, answer: &str) -> Result<String>;
}
