use std::time::Duration;

use nutriproof_provider::{
    AnthropicProvider, CompletionRequest, LlmProvider, OpenAiProvider, ProviderErrorKind,
    StopReason,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn anthropic_completion_sends_version_and_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "Assess stevia"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{"type": "text", "text": "{\"summary\": \"fine\"}"}],
            "usage": {"input_tokens": 20, "output_tokens": 7},
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("test-key", server.uri());
    let completion = provider
        .complete(CompletionRequest::new("claude", "Assess stevia"))
        .await
        .unwrap();

    assert_eq!(completion.text, "{\"summary\": \"fine\"}");
    assert_eq!(completion.stop_reason, Some(StopReason::EndTurn));
    let usage = completion.usage.unwrap();
    assert_eq!((usage.input_tokens, usage.output_tokens), (20, 7));
}

#[tokio::test]
async fn anthropic_rate_limit_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "slow down"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("test-key", server.uri());
    let err = provider
        .complete(CompletionRequest::new("claude", "hi"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::RateLimit);
    assert!(err.is_retryable());
    let text = err.to_string();
    assert!(text.contains("429"));
    assert!(text.contains("slow down"));
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"content": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let provider =
        AnthropicProvider::with_timeout("test-key", server.uri(), Duration::from_millis(50));
    let err = provider
        .complete(CompletionRequest::new("claude", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Timeout);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn openai_completion_uses_bearer_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri());
    let completion = provider
        .complete(CompletionRequest::new("gpt-4o", "hi").with_system("sys"))
        .await
        .unwrap();

    assert_eq!(completion.text, "Hello");
    assert_eq!(completion.stop_reason, Some(StopReason::EndTurn));
}

#[tokio::test]
async fn openai_unparseable_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri());
    let err = provider
        .complete(CompletionRequest::new("gpt-4o", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
}
