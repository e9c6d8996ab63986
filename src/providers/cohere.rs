use crate::config::{GenerationParams, Provider, ProviderConfig};
use crate::core::error::AgoraError;
use crate::providers::classify::ensure_success;
use crate::providers::transport::{HttpClient, HttpTransport};
use crate::providers::{
    LLMProvider, Message, ModelEntry, ModelInfo, Role, SendOptions, chat_turns, require_turns,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const COHERE_VERSION: &str = "2022-12-06";

const MODELS: [(&str, &str, &str); 3] = [
    ("command", "Command", "Main conversational model"),
    ("command-light", "Command Light", "Faster and lighter"),
    ("command-nightly", "Command Nightly", "Experimental"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohereEndpoint {
    /// `/chat`: structured history plus a preamble
    Chat,
    /// `/generate`: legacy single-prompt completion
    Generate,
}

impl CohereEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            CohereEndpoint::Chat => "chat",
            CohereEndpoint::Generate => "generate",
        }
    }
}

/// Which endpoint is tried first, and which one takes over when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointStrategy {
    pub primary: CohereEndpoint,
    pub fallback: Option<CohereEndpoint>,
}

impl EndpointStrategy {
    pub const CHAT_THEN_GENERATE: EndpointStrategy = EndpointStrategy {
        primary: CohereEndpoint::Chat,
        fallback: Some(CohereEndpoint::Generate),
    };

    /// Any failure of the primary call hands over to the fallback, except
    /// those the fallback would hit just the same.
    pub fn should_fall_back(&self, err: &AgoraError) -> bool {
        self.fallback.is_some()
            && !matches!(
                err,
                AgoraError::MissingCredential(_) | AgoraError::Input(_)
            )
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    message: String,
    chat_history: Vec<ChatTurn>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatTurn {
    role: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    model: String,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    stop_sequences: Vec<&'static str>,
    return_likelihoods: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Deserialize)]
struct Generation {
    text: String,
}

#[derive(Clone)]
pub struct CohereProvider {
    client: HttpClient,
    api_key: String,
    model: String,
    params: GenerationParams,
    strategy: EndpointStrategy,
}

impl CohereProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Self {
        let endpoint = config
            .base_url
            .clone()
            .unwrap_or_else(|| Provider::Cohere.default_base_url().to_string());
        let api_key = api_key.unwrap_or_default();
        let mut extra_headers = HashMap::new();
        extra_headers.insert("Cohere-Version".to_string(), COHERE_VERSION.to_string());
        Self {
            client: HttpClient::new(
                transport,
                endpoint,
                Some(("Authorization".to_string(), format!("Bearer {}", api_key))),
                Some(extra_headers),
            ),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Provider::Cohere.default_model().to_string()),
            params: config.params,
            strategy: EndpointStrategy::CHAT_THEN_GENERATE,
        }
    }

    pub fn strategy(&self) -> EndpointStrategy {
        self.strategy
    }

    pub fn build_chat_request(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<ChatRequest, AgoraError> {
        let turns = chat_turns(history);
        require_turns(Provider::Cohere, &turns)?;

        let (last, earlier) = turns
            .split_last()
            .ok_or_else(|| AgoraError::Input("Empty conversation".to_string()))?;
        let chat_history = earlier
            .iter()
            .map(|message| ChatTurn {
                role: match message.role() {
                    Role::User => "USER",
                    _ => "CHATBOT",
                },
                message: message.text.clone(),
            })
            .collect();

        let params = self.params.merged_with(&options.params);
        Ok(ChatRequest {
            model: self.model.clone(),
            message: last.text.clone(),
            chat_history,
            temperature: params.temperature_or_default(),
            max_tokens: params.max_tokens_for(Provider::Cohere),
            p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            preamble: options.system_prompt().map(str::to_string),
        })
    }

    pub fn build_generate_request(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<GenerateRequest, AgoraError> {
        let turns = chat_turns(history);
        require_turns(Provider::Cohere, &turns)?;

        let mut prompt = String::new();
        if let Some(system) = options.system_prompt() {
            prompt.push_str(system);
            prompt.push_str("\n\n");
        }
        for message in &turns {
            let speaker = if message.is_user() { "Human" } else { "Assistant" };
            prompt.push_str(&format!("{}: {}\n", speaker, message.text));
        }
        prompt.push_str("Assistant:");

        let params = self.params.merged_with(&options.params);
        Ok(GenerateRequest {
            model: self.model.clone(),
            prompt,
            max_tokens: params.max_tokens_for(Provider::Cohere),
            temperature: params.temperature_or_default(),
            p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            stop_sequences: vec!["Human:", "\n\nHuman:"],
            return_likelihoods: "NONE",
        })
    }

    pub fn parse_chat_response(body: &str) -> Result<String, AgoraError> {
        let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
            AgoraError::invalid_response(Provider::Cohere, format!("Unexpected chat payload: {}", e))
        })?;
        parsed
            .text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AgoraError::invalid_response(Provider::Cohere, "Chat response has no text"))
    }

    pub fn parse_generate_response(body: &str) -> Result<String, AgoraError> {
        let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
            AgoraError::invalid_response(
                Provider::Cohere,
                format!("Unexpected generate payload: {}", e),
            )
        })?;
        parsed
            .generations
            .into_iter()
            .next()
            .map(|generation| generation.text.trim().to_string())
            .ok_or_else(|| AgoraError::invalid_response(Provider::Cohere, "No generations in response"))
    }

    async fn call(
        &self,
        endpoint: CohereEndpoint,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<String, AgoraError> {
        match endpoint {
            CohereEndpoint::Chat => {
                let payload = self.build_chat_request(history, options)?;
                let response = self.client.post(endpoint.path(), &payload).await?;
                let response = ensure_success(Provider::Cohere, response)?;
                Self::parse_chat_response(&response.body)
            }
            CohereEndpoint::Generate => {
                let payload = self.build_generate_request(history, options)?;
                let response = self.client.post(endpoint.path(), &payload).await?;
                let response = ensure_success(Provider::Cohere, response)?;
                Self::parse_generate_response(&response.body)
            }
        }
    }
}

#[async_trait]
impl LLMProvider for CohereProvider {
    fn provider(&self) -> Provider {
        Provider::Cohere
    }

    async fn send_message(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<String, AgoraError> {
        if !self.is_ready() {
            return Err(AgoraError::MissingCredential(Provider::Cohere));
        }

        let strategy = self.strategy;
        match self.call(strategy.primary, history, options).await {
            Ok(text) => Ok(text),
            Err(err) if strategy.should_fall_back(&err) => {
                let Some(fallback) = strategy.fallback else {
                    return Err(err);
                };
                tracing::warn!(
                    "Cohere {} endpoint failed, using {}: {}",
                    strategy.primary.path(),
                    fallback.path(),
                    err
                );
                self.call(fallback, history, options).await
            }
            Err(err) => Err(err),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider_name: Provider::Cohere.display_name().to_string(),
            model_id: self.model.clone(),
            supports_images: false,
            max_context_tokens: 4096,
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelEntry>, AgoraError> {
        Ok(MODELS
            .iter()
            .map(|(id, name, about)| ModelEntry::tagged(id, name, about))
            .collect())
    }

    fn is_ready(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::transport::testing::MockTransport;
    use serde_json::json;

    fn provider(transport: Arc<MockTransport>, key: Option<&str>) -> CohereProvider {
        CohereProvider::new(transport, key.map(str::to_string), &ProviderConfig::default())
    }

    fn history() -> Vec<Message> {
        vec![
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::user("Tell me a joke"),
        ]
    }

    fn with_system() -> SendOptions {
        SendOptions {
            system_prompt: Some("Be funny".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_key_fails_before_network() {
        let transport = MockTransport::new();
        let err = provider(transport.clone(), None)
            .send_message(&history(), &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgoraError::MissingCredential(Provider::Cohere)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn chat_success_never_calls_generate() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({"text": "Why did the crab cross?"}));
        let cohere = provider(transport.clone(), Some("co-key"));

        let reply = cohere.send_message(&history(), &with_system()).await.unwrap();
        assert_eq!(reply, "Why did the crab cross?");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.ends_with("/v1/chat"));
        assert_eq!(
            requests[0].body["chat_history"],
            json!([
                {"role": "USER", "message": "Hi"},
                {"role": "CHATBOT", "message": "Hello!"}
            ])
        );
        assert_eq!(requests[0].body["message"], json!("Tell me a joke"));
        assert_eq!(requests[0].body["preamble"], json!("Be funny"));
        assert!(
            requests[0]
                .headers
                .contains(&("Cohere-Version".to_string(), "2022-12-06".to_string()))
        );
    }

    #[tokio::test]
    async fn chat_failure_falls_back_to_generate_once() {
        let transport = MockTransport::new();
        transport.push_json(500, json!({"message": "internal error"}));
        transport.push_json(200, json!({"generations": [{"text": "  A pun.  "}]}));
        let cohere = provider(transport.clone(), Some("co-key"));

        let reply = cohere.send_message(&history(), &with_system()).await.unwrap();
        assert_eq!(reply, "A pun.");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.ends_with("/chat"));
        assert!(requests[1].url.ends_with("/generate"));
        assert_eq!(
            requests[1].body["prompt"],
            json!("Be funny\n\nHuman: Hi\nAssistant: Hello!\nHuman: Tell me a joke\nAssistant:")
        );
        assert_eq!(requests[1].body["stop_sequences"], json!(["Human:", "\n\nHuman:"]));
        assert_eq!(requests[1].body["return_likelihoods"], json!("NONE"));
    }

    #[tokio::test]
    async fn generate_error_is_returned_when_both_fail() {
        let transport = MockTransport::new();
        transport.push_json(500, json!({"message": "chat down"}));
        transport.push_json(429, json!({"message": "too many requests"}));
        let cohere = provider(transport.clone(), Some("co-key"));

        let err = cohere
            .send_message(&history(), &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgoraError::RateLimited { .. }));
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn fallback_predicate() {
        let strategy = EndpointStrategy::CHAT_THEN_GENERATE;
        assert!(strategy.should_fall_back(&AgoraError::Network("reset".into())));
        assert!(strategy.should_fall_back(&AgoraError::invalid_response(Provider::Cohere, "empty")));
        assert!(!strategy.should_fall_back(&AgoraError::MissingCredential(Provider::Cohere)));

        let single = EndpointStrategy {
            primary: CohereEndpoint::Generate,
            fallback: None,
        };
        assert!(!single.should_fall_back(&AgoraError::Network("reset".into())));
    }

    #[test]
    fn prompt_without_system_prompt() {
        let transport = MockTransport::new();
        let cohere = provider(transport, Some("co-key"));
        let request = cohere
            .build_generate_request(&[Message::user("Hi")], &SendOptions::default())
            .unwrap();
        assert_eq!(request.prompt, "Human: Hi\nAssistant:");
    }

    #[tokio::test]
    async fn catalog_is_static() {
        let transport = MockTransport::new();
        let models = provider(transport.clone(), None)
            .available_models()
            .await
            .unwrap();
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["command", "command-light", "command-nightly"]);
        assert_eq!(transport.call_count(), 0);
    }
}
