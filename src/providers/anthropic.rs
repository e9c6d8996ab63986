use crate::config::{GenerationParams, Provider, ProviderConfig};
use crate::core::error::AgoraError;
use crate::providers::classify::ensure_success;
use crate::providers::transport::{HttpClient, HttpTransport};
use crate::providers::{
    LLMProvider, Message, ModelEntry, ModelInfo, Role, SendOptions, chat_turns,
    final_turn_images, require_turns,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const MODELS: [(&str, &str, &str); 5] = [
    ("claude-3-opus-20240229", "Claude 3 Opus", "premium"),
    ("claude-3-sonnet-20240229", "Claude 3 Sonnet", "standard"),
    ("claude-3-haiku-20240307", "Claude 3 Haiku", "fast"),
    ("claude-2.1", "Claude 2.1", "legacy"),
    ("claude-2.0", "Claude 2.0", "legacy"),
];

/// Request quota as reported by the `anthropic-ratelimit-requests-*` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
    /// RFC 3339 timestamp at which the window resets
    pub reset: Option<String>,
}

#[derive(Clone)]
pub struct AnthropicProvider {
    client: HttpClient,
    api_key: String,
    model: String,
    params: GenerationParams,
}

impl AnthropicProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Self {
        let endpoint = config
            .base_url
            .clone()
            .unwrap_or_else(|| Provider::Anthropic.default_base_url().to_string());
        let api_key = api_key.unwrap_or_default();
        let mut extra_headers = HashMap::new();
        extra_headers.insert(
            "anthropic-version".to_string(),
            ANTHROPIC_VERSION.to_string(),
        );
        Self {
            client: HttpClient::new(
                transport,
                endpoint,
                Some(("x-api-key".to_string(), api_key.clone())),
                Some(extra_headers),
            ),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Provider::Anthropic.default_model().to_string()),
            params: config.params,
        }
    }

    pub fn build_request(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<AnthropicRequest, AgoraError> {
        let turns = chat_turns(history);
        require_turns(Provider::Anthropic, &turns)?;

        let images = final_turn_images(&turns, options);
        let last = turns.len() - 1;
        let messages = turns
            .iter()
            .enumerate()
            .map(|(i, message)| {
                let role = match message.role() {
                    Role::User => "user",
                    _ => "assistant",
                };
                let content = if i == last && !images.is_empty() {
                    let mut blocks = vec![ContentBlock::Text {
                        text: message.text.clone(),
                    }];
                    blocks.extend(images.iter().map(|image| ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: image.mime_type.clone(),
                            data: image.data.clone(),
                        },
                    }));
                    AnthropicContent::Blocks(blocks)
                } else {
                    AnthropicContent::Text(message.text.clone())
                };
                AnthropicMessage { role, content }
            })
            .collect();

        let params = self.params.merged_with(&options.params);
        Ok(AnthropicRequest {
            model: self.model.clone(),
            max_tokens: params.max_tokens_for(Provider::Anthropic),
            temperature: params.temperature_or_default(),
            top_p: params.top_p,
            messages,
            system: options.system_prompt().map(str::to_string),
        })
    }

    /// Sends a one-token request and reads the quota headers off the reply.
    /// Error statuses are not raised: a 429 still carries the headers.
    pub async fn check_rate_limit(&self) -> Result<RateLimitStatus, AgoraError> {
        if !self.is_ready() {
            return Err(AgoraError::MissingCredential(Provider::Anthropic));
        }

        let mut payload = self.build_request(&[Message::user("test")], &SendOptions::default())?;
        payload.max_tokens = 1;
        let response = self.client.post("messages", &payload).await?;

        let number = |name: &str| {
            response
                .header(name)
                .and_then(|value| value.trim().parse::<u64>().ok())
        };
        Ok(RateLimitStatus {
            remaining: number("anthropic-ratelimit-requests-remaining"),
            limit: number("anthropic-ratelimit-requests-limit"),
            reset: response
                .header("anthropic-ratelimit-requests-reset")
                .map(str::to_string),
        })
    }

    pub fn parse_response(body: &str) -> Result<String, AgoraError> {
        let parsed: AnthropicResponse = serde_json::from_str(body).map_err(|e| {
            AgoraError::invalid_response(Provider::Anthropic, format!("Unexpected payload: {}", e))
        })?;

        if parsed.content.is_empty() {
            return Err(AgoraError::invalid_response(
                Provider::Anthropic,
                "Empty response from Anthropic",
            ));
        }

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(AgoraError::invalid_response(
                Provider::Anthropic,
                "No text blocks in response",
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn send_message(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<String, AgoraError> {
        if !self.is_ready() {
            return Err(AgoraError::MissingCredential(Provider::Anthropic));
        }

        let payload = self.build_request(history, options)?;
        let response = self.client.post("messages", &payload).await?;
        let response = ensure_success(Provider::Anthropic, response)?;
        Self::parse_response(&response.body)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider_name: Provider::Anthropic.display_name().to_string(),
            model_id: self.model.clone(),
            supports_images: true,
            max_context_tokens: 200_000,
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelEntry>, AgoraError> {
        Ok(MODELS
            .iter()
            .map(|(id, name, tier)| ModelEntry::tagged(id, name, tier))
            .collect())
    }

    fn is_ready(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::ImageAttachment;
    use crate::providers::transport::testing::MockTransport;
    use serde_json::json;

    fn provider(transport: Arc<MockTransport>, key: Option<&str>) -> AnthropicProvider {
        AnthropicProvider::new(
            transport,
            key.map(str::to_string),
            &ProviderConfig::default(),
        )
    }

    #[tokio::test]
    async fn missing_key_fails_before_network() {
        let transport = MockTransport::new();
        let err = provider(transport.clone(), Some("  "))
            .send_message(&[Message::user("hi")], &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgoraError::MissingCredential(Provider::Anthropic)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn system_prompt_is_a_top_level_field() {
        let transport = MockTransport::new();
        transport.push_json(
            200,
            json!({"content": [{"type": "text", "text": "Hello"}, {"type": "text", "text": " there"}]}),
        );
        let claude = provider(transport.clone(), Some("sk-ant"));

        let history = vec![
            Message::user("hi"),
            Message::assistant("hey"),
            Message::user("again"),
        ];
        let options = SendOptions {
            system_prompt: Some("You are terse".into()),
            ..Default::default()
        };
        let reply = claude.send_message(&history, &options).await.unwrap();
        assert_eq!(reply, "Hello there");

        let request = &transport.requests()[0];
        assert!(request.url.ends_with("/v1/messages"));
        assert!(
            request
                .headers
                .contains(&("anthropic-version".to_string(), "2023-06-01".to_string()))
        );
        assert!(
            request
                .headers
                .contains(&("x-api-key".to_string(), "sk-ant".to_string()))
        );
        assert_eq!(request.body["system"], json!("You are terse"));
        assert_eq!(
            request.body["messages"],
            json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hey"},
                {"role": "user", "content": "again"}
            ])
        );
    }

    #[tokio::test]
    async fn images_become_base64_blocks() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({"content": [{"type": "text", "text": "ok"}]}));
        let claude = provider(transport.clone(), Some("sk-ant"));

        let image = ImageAttachment::new("x.gif", "image/gif", b"gif").unwrap();
        let history = vec![Message::user("describe").with_attachments(vec![image])];
        claude
            .send_message(&history, &SendOptions::default())
            .await
            .unwrap();

        let body = transport.last_body();
        assert!(body.get("system").is_none());
        assert_eq!(
            body["messages"][0]["content"],
            json!([
                {"type": "text", "text": "describe"},
                {"type": "image", "source": {"type": "base64", "media_type": "image/gif", "data": "Z2lm"}}
            ])
        );
    }

    #[tokio::test]
    async fn empty_content_is_invalid_response() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({"content": []}));
        let err = provider(transport, Some("sk-ant"))
            .send_message(&[Message::user("hi")], &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgoraError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn rate_limit_is_read_from_headers() {
        let transport = MockTransport::new();
        transport.push_response(
            429,
            &[
                ("anthropic-ratelimit-requests-remaining", "0"),
                ("anthropic-ratelimit-requests-limit", "50"),
                ("anthropic-ratelimit-requests-reset", "2024-05-01T12:00:30Z"),
            ],
            json!({"type": "error", "error": {"type": "rate_limit_error", "message": "slow"}}),
        );
        let claude = provider(transport.clone(), Some("sk-ant"));

        let status = claude.check_rate_limit().await.unwrap();
        assert_eq!(
            status,
            RateLimitStatus {
                remaining: Some(0),
                limit: Some(50),
                reset: Some("2024-05-01T12:00:30Z".to_string()),
            }
        );

        let request = &transport.requests()[0];
        assert!(request.url.ends_with("/v1/messages"));
        assert_eq!(request.body["max_tokens"], json!(1));
        assert_eq!(
            request.body["messages"],
            json!([{"role": "user", "content": "test"}])
        );
    }

    #[tokio::test]
    async fn rate_limit_needs_a_key() {
        let transport = MockTransport::new();
        let err = provider(transport.clone(), None)
            .check_rate_limit()
            .await
            .unwrap_err();
        assert!(matches!(err, AgoraError::MissingCredential(Provider::Anthropic)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn catalog_lists_tiers() {
        let claude = provider(MockTransport::new(), Some("sk-ant"));
        let models = claude.available_models().await.unwrap();
        assert_eq!(models.len(), 5);
        assert_eq!(
            models[0],
            ModelEntry::tagged("claude-3-opus-20240229", "Claude 3 Opus", "premium")
        );
        assert!(models.iter().any(|m| m.id == Provider::Anthropic.default_model()));
    }
}
