use super::{LLMProvider, Message, ModelEntry, ModelInfo, Role, SendOptions};
use crate::config::{GenerationParams, Provider, ProviderConfig};
use crate::core::error::AgoraError;
use crate::providers::classify::ensure_success;
use crate::providers::transport::{HttpClient, HttpTransport};
use crate::providers::{chat_turns, final_turn_images, require_turns};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelObject>,
}

#[derive(Deserialize)]
struct ModelObject {
    id: String,
}

/// Served when the `/models` listing cannot be fetched.
const FALLBACK_MODELS: [(&str, &str); 3] = [
    ("gpt-3.5-turbo", "GPT-3.5 Turbo"),
    ("gpt-4", "GPT-4"),
    ("gpt-4-turbo", "GPT-4 Turbo"),
];

#[derive(Clone)]
pub struct OpenAIProvider {
    client: HttpClient,
    api_key: String,
    model: String,
    params: GenerationParams,
}

impl OpenAIProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Self {
        let endpoint = config
            .base_url
            .clone()
            .unwrap_or_else(|| Provider::OpenAI.default_base_url().to_string());
        let api_key = api_key.unwrap_or_default();
        let auth_header = Some(("Authorization".to_string(), format!("Bearer {}", api_key)));
        Self {
            client: HttpClient::new(transport, endpoint, auth_header, None),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Provider::OpenAI.default_model().to_string()),
            params: config.params,
        }
    }

    fn supports_images(&self) -> bool {
        self.model.contains("gpt-4")
    }

    pub fn build_request(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<ChatCompletionRequest, AgoraError> {
        let turns = chat_turns(history);
        require_turns(Provider::OpenAI, &turns)?;

        let mut messages = Vec::with_capacity(turns.len() + 1);
        if let Some(system) = options.system_prompt() {
            messages.push(ChatCompletionMessage {
                role: "system",
                content: MessageContent::Text(system.to_string()),
            });
        }

        let images = final_turn_images(&turns, options);
        let last = turns.len() - 1;
        for (i, message) in turns.iter().enumerate() {
            let role = match message.role() {
                Role::User => "user",
                _ => "assistant",
            };

            // Non-vision models never see the images.
            let content = if i == last && !images.is_empty() && self.supports_images() {
                let mut parts = vec![ContentPart::Text {
                    text: message.text.clone(),
                }];
                parts.extend(images.iter().map(|image| ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                }));
                MessageContent::Parts(parts)
            } else {
                MessageContent::Text(message.text.clone())
            };

            messages.push(ChatCompletionMessage { role, content });
        }

        let params = self.params.merged_with(&options.params);
        Ok(ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: params.max_tokens_for(Provider::OpenAI),
            temperature: params.temperature_or_default(),
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            stream: false,
        })
    }

    pub fn parse_response(body: &str) -> Result<String, AgoraError> {
        let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
            AgoraError::invalid_response(Provider::OpenAI, format!("Unexpected payload: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AgoraError::invalid_response(Provider::OpenAI, "No choices in API response"))?;

        if content.trim().is_empty() {
            return Err(AgoraError::invalid_response(
                Provider::OpenAI,
                "Empty message content",
            ));
        }

        Ok(content)
    }

    /// Chat-capable entries of the live `/models` listing.
    async fn fetch_models(&self) -> Result<Vec<ModelEntry>, AgoraError> {
        let response = self.client.get("models").await?;
        let response = ensure_success(Provider::OpenAI, response)?;
        let list: ModelList = response.json().map_err(|e| {
            AgoraError::invalid_response(Provider::OpenAI, format!("Bad model list: {}", e))
        })?;
        Ok(list
            .data
            .into_iter()
            .filter(|model| model.id.contains("gpt"))
            .map(|model| ModelEntry::new(model.id.clone(), model.id))
            .collect())
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn send_message(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<String, AgoraError> {
        if !self.is_ready() {
            return Err(AgoraError::MissingCredential(Provider::OpenAI));
        }

        let payload = self.build_request(history, options)?;
        let response = self.client.post("chat/completions", &payload).await?;
        let response = ensure_success(Provider::OpenAI, response)?;
        Self::parse_response(&response.body)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider_name: Provider::OpenAI.display_name().to_string(),
            model_id: self.model.clone(),
            supports_images: self.supports_images(),
            max_context_tokens: if self.supports_images() { 128_000 } else { 4096 },
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelEntry>, AgoraError> {
        if !self.is_ready() {
            return Err(AgoraError::MissingCredential(Provider::OpenAI));
        }
        match self.fetch_models().await {
            Ok(models) => Ok(models),
            Err(e) => {
                tracing::warn!("Could not list OpenAI models: {}", e);
                Ok(FALLBACK_MODELS
                    .iter()
                    .map(|(id, name)| ModelEntry::new(*id, *name))
                    .collect())
            }
        }
    }

    fn is_ready(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
