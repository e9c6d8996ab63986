use crate::config::{GenerationParams, Provider, ProviderConfig};
use crate::core::error::AgoraError;
use crate::providers::classify::ensure_success;
use crate::providers::transport::{HttpClient, HttpTransport};
use crate::providers::{
    LLMProvider, Message, ModelEntry, ModelInfo, SendOptions, chat_turns, require_turns,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ROLE_TAGGED_STOPS: [&str; 2] = ["<|user|>", "<|system|>"];

const MODELS: [(&str, &str, &str); 7] = [
    ("microsoft/DialoGPT-medium", "DialoGPT Medium", "conversational"),
    ("microsoft/DialoGPT-large", "DialoGPT Large", "conversational"),
    ("facebook/blenderbot-400M-distill", "BlenderBot 400M", "conversational"),
    ("mistralai/Mistral-7B-Instruct-v0.1", "Mistral 7B Instruct", "instruction"),
    ("meta-llama/Llama-2-7b-chat-hf", "Llama 2 7B Chat", "chat"),
    ("codellama/CodeLlama-7b-Instruct-hf", "Code Llama 7B", "code"),
    ("HuggingFaceH4/zephyr-7b-beta", "Zephyr 7B Beta", "assistant"),
];

/// Availability of the configured model on the hosted inference API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Ready,
    /// Cold model being loaded onto the inference servers
    Loading,
    Unavailable(String),
}

/// How a conversation is flattened into the single `inputs` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// `User: …\nBot: …\nBot:` for conversational checkpoints
    Dialogue,
    /// `<|system|>` / `<|user|>` / `<|assistant|>` blocks for instruction-tuned models
    RoleTagged,
}

impl PromptTemplate {
    pub fn for_model(model: &str) -> Self {
        let model = model.to_lowercase();
        if model.contains("dialogpt") || model.contains("blenderbot") {
            PromptTemplate::Dialogue
        } else {
            PromptTemplate::RoleTagged
        }
    }

    pub fn render(&self, system: Option<&str>, turns: &[&Message]) -> String {
        let mut prompt = String::new();
        match self {
            PromptTemplate::Dialogue => {
                if let Some(system) = system {
                    prompt.push_str(system);
                    prompt.push_str("\n\n");
                }
                for message in turns {
                    let speaker = if message.is_user() { "User" } else { "Bot" };
                    prompt.push_str(&format!("{}: {}\n", speaker, message.text));
                }
                prompt.push_str("Bot:");
            }
            PromptTemplate::RoleTagged => {
                if let Some(system) = system {
                    prompt.push_str(&format!("<|system|>\n{}\n", system));
                }
                for message in turns {
                    let tag = if message.is_user() { "user" } else { "assistant" };
                    prompt.push_str(&format!("<|{}|>\n{}\n", tag, message.text));
                }
                prompt.push_str("<|assistant|>\n");
            }
        }
        prompt
    }

    fn stop_sequences(&self) -> Option<Vec<&'static str>> {
        match self {
            PromptTemplate::Dialogue => None,
            PromptTemplate::RoleTagged => Some(ROLE_TAGGED_STOPS.to_vec()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    do_sample: bool,
    return_full_text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
    use_cache: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<GeneratedItem>),
    Single(GeneratedItem),
}

#[derive(Deserialize)]
struct GeneratedItem {
    generated_text: Option<String>,
    text: Option<String>,
}

#[derive(Clone)]
pub struct HuggingFaceProvider {
    client: HttpClient,
    api_key: String,
    model: String,
    params: GenerationParams,
    wait_for_model: bool,
}

impl HuggingFaceProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Self {
        let endpoint = config
            .base_url
            .clone()
            .unwrap_or_else(|| Provider::HuggingFace.default_base_url().to_string());
        let api_key = api_key.unwrap_or_default();
        Self {
            client: HttpClient::new(
                transport,
                endpoint,
                Some(("Authorization".to_string(), format!("Bearer {}", api_key))),
                None,
            ),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Provider::HuggingFace.default_model().to_string()),
            params: config.params,
            wait_for_model: config.wait_for_model,
        }
    }

    pub fn template(&self) -> PromptTemplate {
        PromptTemplate::for_model(&self.model)
    }

    pub fn build_request(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<InferenceRequest, AgoraError> {
        let turns = chat_turns(history);
        require_turns(Provider::HuggingFace, &turns)?;

        let template = self.template();
        let params = self.params.merged_with(&options.params);
        Ok(InferenceRequest {
            inputs: template.render(options.system_prompt(), &turns),
            parameters: InferenceParameters {
                max_new_tokens: params.max_tokens_for(Provider::HuggingFace),
                temperature: params.temperature_or_default(),
                top_p: params.top_p,
                do_sample: true,
                return_full_text: false,
                stop: template.stop_sequences(),
            },
            options: InferenceOptions {
                wait_for_model: self.wait_for_model,
                use_cache: false,
            },
        })
    }

    /// Asks the model endpoint for its state with a GET. Only a missing key is an error;
    /// transport failures are reported as `Unavailable`.
    pub async fn check_model_status(&self) -> Result<ModelStatus, AgoraError> {
        if !self.is_ready() {
            return Err(AgoraError::MissingCredential(Provider::HuggingFace));
        }

        let status = match self.client.get(&self.model).await {
            Ok(response) if response.is_success() => ModelStatus::Ready,
            Ok(response) if response.status == 503 => ModelStatus::Loading,
            Ok(response) => ModelStatus::Unavailable(format!("HTTP {}", response.status)),
            Err(e) => ModelStatus::Unavailable(e.to_string()),
        };
        tracing::debug!(model = %self.model, ?status, "model status");
        Ok(status)
    }

    /// Accepts `[{generated_text}]`, `[{text}]` and `{generated_text}`.
    pub fn parse_response(body: &str) -> Result<String, AgoraError> {
        let parsed: InferenceResponse = serde_json::from_str(body).map_err(|e| {
            AgoraError::invalid_response(Provider::HuggingFace, format!("Unexpected payload: {}", e))
        })?;

        let text = match parsed {
            InferenceResponse::Batch(items) => items
                .into_iter()
                .next()
                .and_then(|item| item.generated_text.or(item.text)),
            InferenceResponse::Single(item) => item.generated_text,
        };

        text.map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AgoraError::invalid_response(Provider::HuggingFace, "No generated text in response")
            })
    }
}

#[async_trait]
impl LLMProvider for HuggingFaceProvider {
    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }

    async fn send_message(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<String, AgoraError> {
        if !self.is_ready() {
            return Err(AgoraError::MissingCredential(Provider::HuggingFace));
        }

        let payload = self.build_request(history, options)?;
        let response = self.client.post(&self.model, &payload).await?;
        let response = ensure_success(Provider::HuggingFace, response)?;
        Self::parse_response(&response.body)
    }

    fn model_info(&self) -> ModelInfo {
        let model = self.model.to_lowercase();
        ModelInfo {
            provider_name: Provider::HuggingFace.display_name().to_string(),
            model_id: self.model.clone(),
            supports_images: model.contains("vision") || model.contains("clip"),
            max_context_tokens: 4096,
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelEntry>, AgoraError> {
        Ok(MODELS
            .iter()
            .map(|(id, name, kind)| ModelEntry::tagged(id, name, kind))
            .collect())
    }

    fn is_ready(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
