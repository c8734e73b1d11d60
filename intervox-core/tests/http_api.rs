use intervox_core::{HttpInterviewApi, InterviewApi, InterviewError, StartRequest};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> StartRequest {
    StartRequest {
        user_id: "candidate-7".into(),
        job_role: "Backend Engineer".into(),
        company: "Acme & Sons".into(),
    }
}

async fn api_for(server: &MockServer) -> HttpInterviewApi {
    HttpInterviewApi::new(format!("{}/api/", server.uri())).expect("client should build")
}

#[tokio::test]
async fn opening_question_is_fetched_with_role_and_company_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/interview/start/candidate-7"))
        .and(query_param("jobRole", "Backend Engineer"))
        .and(query_param("company", "Acme & Sons"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  Tell me about yourself\n"))
        .expect(1)
        .mount(&server)
        .await;

    let question = api_for(&server)
        .await
        .start_interview(&request())
        .await
        .expect("opening question");
    assert_eq!(question, "Tell me about yourself");
}

#[tokio::test]
async fn answer_is_posted_as_json_and_next_question_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interview/respond"))
        .and(body_json(json!({ "answer": "I am a developer" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "question": "What languages do you use?" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let next = api_for(&server)
        .await
        .respond("I am a developer")
        .await
        .expect("next question");
    assert_eq!(next, "What languages do you use?");
}

#[tokio::test]
async fn non_success_status_becomes_http_error_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interview/respond"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model overloaded"))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .await
        .respond("anything")
        .await
        .expect_err("503 must fail");
    match err {
        InterviewError::Http { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "model overloaded");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_respond_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interview/respond"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .await
        .respond("anything")
        .await
        .expect_err("bad body must fail");
    assert!(matches!(err, InterviewError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    // Nothing listens on the discard port.
    let api = HttpInterviewApi::new("http://127.0.0.1:9/api").expect("client should build");
    let err = api
        .start_interview(&request())
        .await
        .expect_err("connection must fail");
    assert!(matches!(err, InterviewError::Transport(_)), "got {err:?}");
}
