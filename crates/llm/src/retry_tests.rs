use std::time::Duration;

use crate::ai_types::{ChatMessage, ChatRequest};
use crate::client::{ChatModel, LlmClient};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> LlmClient {
    LlmClient::new("test-key".to_owned(), format!("{}/v1", server.uri()), "test-model".to_owned())
        .expect("client")
        .with_retry_base(Duration::from_millis(5))
}

fn create_test_request() -> ChatRequest {
    ChatRequest::new("test-model", vec![ChatMessage::user("how many users?")])
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "message": { "content": content, "role": "assistant" }
        }]
    })
}

#[tokio::test]
async fn test_success_on_first_attempt() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("test response")))
        .mount(&server)
        .await;

    let result = client.chat_completion(&create_test_request()).await.unwrap();
    assert_eq!(result, "test response");
}

#[tokio::test]
async fn test_retry_on_429_then_success() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("success after retry")))
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
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.chat_completion(&create_test_request()).await;
    let err_msg = result.unwrap_err().to_string();
    assert!(err_msg.contains("401"));
    assert!(err_msg.contains("Unauthorized"));
}

#[tokio::test]
async fn test_all_retries_exhausted() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(4)
        .mount(&server)
        .await;

    let result = client.chat_completion(&create_test_request()).await;
    let err_msg = result.unwrap_err().to_string();
    assert!(err_msg.contains("503"));
    assert!(err_msg.contains("Service Unavailable"));
}

#[tokio::test]
async fn test_empty_choices_is_error() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let result = client.chat_completion(&create_test_request()).await;
    assert!(matches!(result, Err(crate::LlmError::EmptyResponse)));
}

#[tokio::test]
async fn test_chat_model_uses_configured_model_and_sampling() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "top_p": 0.8,
            "messages": [{"role": "system", "content": "schema"}, {"role": "user", "content": "q"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("```sql\nSELECT 1\n```")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client
        .chat(vec![ChatMessage::system("schema"), ChatMessage::user("q")])
        .await
        .unwrap();
    assert!(reply.contains("SELECT 1"));
}

#[tokio::test]
async fn test_empty_key_sends_no_authorization() {
    let server = MockServer::start().await;
    let client = LlmClient::new(String::new(), server.uri(), "m".to_owned()).expect("client");

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .mount(&server)
        .await;

    let result = client.chat_completion(&create_test_request()).await.unwrap();
    assert_eq!(result, "ok");
    let received = server.received_requests().await.expect("recording enabled");
    assert!(received[0].headers.get("authorization").is_none());
}
