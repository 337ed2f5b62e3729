use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::ai_types::{ChatRequest, Message};
use crate::client::{LlmClient, MAX_RETRY_AFTER_STEPS, retry_steps};
use crate::error::LlmError;

fn test_client(server: &MockServer) -> LlmClient {
    LlmClient::new("test-key".to_owned(), server.uri())
        .unwrap()
        .with_retry_unit(Duration::from_millis(1))
}

fn create_test_request() -> ChatRequest {
    ChatRequest {
        model: "test-model".to_owned(),
        messages: vec![Message::new("user", "hello")],
        temperature: None,
    }
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{ "message": { "content": content, "role": "assistant" } }]
    }))
}

#[tokio::test]
async fn test_success_on_first_attempt() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(completion("test response"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.chat_completion(&create_test_request()).await.unwrap();
    assert_eq!(result, "test response");
}

#[tokio::test]
async fn test_retry_on_429_then_success() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("success after retry"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit exceeded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let result = client.chat_completion(&create_test_request()).await.unwrap();
    assert_eq!(result, "success after retry");
}

#[tokio::test]
async fn test_no_retry_on_401() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.chat_completion(&create_test_request()).await.unwrap_err();
    assert!(!err.is_transient());
    let err_msg = err.to_string();
    assert!(err_msg.contains("401"));
    assert!(err_msg.contains("Unauthorized"));
}

#[tokio::test]
async fn test_all_retries_exhausted() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(4)
        .mount(&server)
        .await;

    let err = client.chat_completion(&create_test_request()).await.unwrap_err();
    assert!(matches!(err, LlmError::RetriesExhausted(_)));
    let err_msg = err.to_string();
    assert!(err_msg.contains("503"));
    assert!(err_msg.contains("Service Unavailable"));
}

#[tokio::test]
async fn test_empty_choices_is_error() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
        )
        .mount(&server)
        .await;

    let err = client.chat_completion(&create_test_request()).await.unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}

#[test]
fn test_retry_after_overrides_backoff_and_is_capped() {
    assert_eq!(retry_steps(1, None), 1);
    assert_eq!(retry_steps(3, None), 4);
    assert_eq!(retry_steps(1, Some(0)), 0);
    assert_eq!(retry_steps(1, Some(7)), 7);
    assert_eq!(retry_steps(2, Some(3600)), MAX_RETRY_AFTER_STEPS);
}

#[tokio::test]
async fn test_429_with_retry_after_then_success() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("after the wait"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    let result = client.chat_completion(&create_test_request()).await.unwrap();
    assert_eq!(result, "after the wait");
}
