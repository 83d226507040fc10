use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    http_client, Completion, CompletionRequest, LlmProvider, ProviderError, StopReason, Usage,
    DEFAULT_TIMEOUT,
};

const NAME: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_timeout(api_key, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest::from_request(&request))
            .send()
            .await
            .map_err(|e| ProviderError::transport(NAME, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .map(|e| (e.error.kind, e.error.message));
            return Err(ProviderError::status(NAME, status, detail));
        }

        let body: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::malformed(NAME, e.to_string()))?;
        Ok(body.into_completion())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [UserTurn<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> MessagesRequest<'a> {
    fn from_request(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: [UserTurn {
                role: "user",
                content: &request.prompt,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<RawUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    fn into_completion(self) -> Completion {
        let text = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Completion {
            text,
            usage: self.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
            stop_reason: self.stop_reason.as_deref().map(StopReason::parse),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let provider = AnthropicProvider::new("k", "https://api.anthropic.com/");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn request_is_a_single_user_turn() {
        let req = CompletionRequest::new("claude-sonnet-4-20250514", "Assess aspartame")
            .with_max_tokens(512);
        let value = serde_json::to_value(MessagesRequest::from_request(&req)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 512,
                "messages": [{"role": "user", "content": "Assess aspartame"}]
            })
        );
    }

    #[test]
    fn system_prompt_is_top_level() {
        let req = CompletionRequest::new("m", "x").with_system("You are a nutrition scientist");
        let value = serde_json::to_value(MessagesRequest::from_request(&req)).unwrap();
        assert_eq!(value["system"], "You are a nutrition scientist");
    }

    #[test]
    fn non_text_blocks_are_skipped() {
        let body: MessagesResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "part one"},
                {"type": "text", "text": "part two"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 34},
            "stop_reason": "max_tokens"
        }))
        .unwrap();
        let completion = body.into_completion();
        assert_eq!(completion.text, "part one\npart two");
        assert_eq!(completion.usage.map(|u| u.output_tokens), Some(34));
        assert!(completion.is_truncated());
    }
}
