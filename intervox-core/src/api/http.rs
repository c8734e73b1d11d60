//! `HttpInterviewApi` — reqwest client for the interview service.
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | opening question | `GET {base}/interview/start/{userId}?jobRole=&company=` | plain text |
//! | answer | `POST {base}/interview/respond` `{"answer": ...}` | `{"question": ...}` |
//!
//! No request timeout is applied; a stuck request keeps the submission guard
//! held until the transport gives up, and the user retries manually.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{InterviewApi, StartRequest};
use crate::error::{InterviewError, Result};

/// Default service root; the interview endpoints are mounted under `/api`.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Serialize)]
struct RespondRequest<'a> {
    answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct RespondResponse {
    question: String,
}

#[derive(Debug, Clone)]
pub struct HttpInterviewApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpInterviewApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| InterviewError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Use a preconfigured client (proxies, custom TLS roots, cookie jars).
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/interview/start/{user_id}`, with the id percent-encoded as a
    /// single path segment.
    fn start_url(&self, user_id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| InterviewError::Config(format!("invalid service URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| InterviewError::Config(format!("service URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["interview", "start", user_id]);
        Ok(url)
    }
}

#[async_trait]
impl InterviewApi for HttpInterviewApi {
    async fn start_interview(&self, request: &StartRequest) -> Result<String> {
        let url = self.start_url(&request.user_id)?;
        debug!(%url, job_role = %request.job_role, company = %request.company, "requesting opening question");
        let response = self
            .client
            .get(url)
            .query(&[
                ("jobRole", request.job_role.as_str()),
                ("company", request.company.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;
        let body = success_body(response).await?;
        Ok(body.trim().to_string())
    }

    async fn respond(&self, answer: &str) -> Result<String> {
        let url = format!("{}/interview/respond", self.base_url);
        debug!(%url, chars = answer.chars().count(), "posting answer");
        let response = self
            .client
            .post(url)
            .json(&RespondRequest { answer })
            .send()
            .await
            .map_err(transport)?;
        let body = success_body(response).await?;
        let parsed: RespondResponse =
            serde_json::from_str(&body).map_err(|e| InterviewError::Decode(e.to_string()))?;
        Ok(parsed.question)
    }
}

fn transport(e: reqwest::Error) -> InterviewError {
    InterviewError::Transport(e.to_string())
}

async fn success_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(InterviewError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed_of_trailing_slashes() {
        let api = HttpInterviewApi::new(" http://example.test/api// ").expect("client builds");
        assert_eq!(api.base_url(), "http://example.test/api");
    }

    #[test]
    fn user_id_is_a_single_encoded_path_segment() {
        let api = HttpInterviewApi::new("http://example.test/api").expect("client builds");
        let url = api.start_url("a/b?c#d").expect("valid url");
        assert_eq!(url.path(), "/api/interview/start/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let root = HttpInterviewApi::new("http://example.test/").expect("client builds");
        assert_eq!(
            root.start_url("guest").expect("valid url").as_str(),
            "http://example.test/interview/start/guest"
        );
    }

    #[test]
    fn unparseable_base_url_is_a_config_error() {
        let api = HttpInterviewApi::new("not a url").expect("client builds");
        assert!(matches!(api.start_url("guest"), Err(InterviewError::Config(_))));
    }

    #[test]
    fn respond_request_serializes_answer_field() {
        let json = serde_json::to_value(RespondRequest { answer: "hello" }).expect("serialize");
        assert_eq!(json, serde_json::json!({ "answer": "hello" }));
    }
}
