use pagesift::llm::{CompletionBackend, CompletionSettings, LlmError, TogetherClient};
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn client(server: &MockServer) -> TogetherClient {
    TogetherClient::new(
        format!("{}/v1/", server.uri()),
        "test-key",
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn returns_first_choice_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "max_tokens": 4000,
            "prompt": "Extract please",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cmpl-1",
            "choices": [
                {"text": "  {\"Company\": \"Acme\"}\n", "index": 0},
                {"text": "ignored", "index": 1}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = CompletionSettings::default().request("Extract please");
    let text = client(&mock_server).complete(&request).await.unwrap();
    assert_eq!(text, "{\"Company\": \"Acme\"}");
}

#[tokio::test]
async fn rate_limit_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let request = CompletionSettings::default().request("x");
    let err = client(&mock_server).complete(&request).await.unwrap_err();
    assert!(matches!(err, LlmError::RateLimited));
    assert!(err.is_transient());
}

#[tokio::test]
async fn unauthorized_is_permanent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&mock_server)
        .await;

    let request = CompletionSettings::default().request("x");
    let err = client(&mock_server).complete(&request).await.unwrap_err();
    assert!(matches!(err, LlmError::Unauthorized(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn server_error_keeps_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&mock_server)
        .await;

    let request = CompletionSettings::default().request("x");
    match client(&mock_server).complete(&request).await {
        Err(LlmError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("Expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&mock_server)
        .await;

    let request = CompletionSettings::default().request("x");
    let err = client(&mock_server).complete(&request).await.unwrap_err();
    assert!(matches!(err, LlmError::MalformedResponse(_)));
}

#[test]
fn empty_api_key_rejected() {
    let result = TogetherClient::new("http://localhost/v1", "", Duration::from_secs(1));
    assert!(matches!(result, Err(LlmError::Config(_))));
}
