//! Ollama generation client against a mocked Ollama server.

#![cfg(feature = "ollama")]

use forum_rag::llm::{ollama::OllamaClient, LLMClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============= Helper Functions =============

/// Create a mock Ollama chat completion response
fn mock_chat_response(content: &str) -> serde_json::Value {
    json!({
        "model": "llama3.2",
        "created_at": "2024-01-01T00:00:00Z",
        "message": {
            "role": "assistant",
            "content": content
        },
        "done": true
    })
}

#[tokio::test]
async fn test_ollama_chat() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.2",
            "options": { "num_predict": 128 }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(mock_chat_response("Das sagen andere Nutzer dazu: Geduld.")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = OllamaClient::new(&mock_server.uri(), "llama3.2".to_string()).unwrap();
    let answer = client.generate("Frage?", 128).await.unwrap();

    assert_eq!(answer, "Das sagen andere Nutzer dazu: Geduld.");
    assert_eq!(client.model_name(), "llama3.2");
}

#[tokio::test]
async fn test_ollama_server_error_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&mock_server)
        .await;

    let client = OllamaClient::new(&mock_server.uri(), "llama3.2".to_string()).unwrap();
    let err = client.generate("Frage?", 128).await.unwrap_err();
    assert!(err.is_transient());
}

#[test]
fn test_ollama_invalid_url() {
    assert!(OllamaClient::new("not a url", "llama3.2".to_string()).is_err());
}
