use crate::config::{GenerationParams, Provider, ProviderConfig};
use crate::core::error::AgoraError;
use crate::providers::transport::HttpTransport;
use crate::providers::{LLMProvider, Message, ModelEntry, ModelInfo, SendOptions};
use async_trait::async_trait;
use std::sync::Arc;

mod client;
mod types;

pub use client::GeminiClient;

#[derive(Clone)]
pub struct GeminiProvider {
    client: GeminiClient,
    api_key: String,
    params: GenerationParams,
}

impl GeminiProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Provider::Gemini.default_base_url().to_string());
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| Provider::Gemini.default_model().to_string());
        let api_key = api_key.unwrap_or_default();
        Self {
            client: GeminiClient::new(transport, base_url, api_key.clone(), model),
            api_key,
            params: config.params,
        }
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn send_message(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<String, AgoraError> {
        if !self.is_ready() {
            return Err(AgoraError::MissingCredential(Provider::Gemini));
        }
        let params = self.params.merged_with(&options.params);
        self.client.generate_content(history, options, &params).await
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider_name: Provider::Gemini.display_name().to_string(),
            model_id: self.client.model.clone(),
            supports_images: true,
            max_context_tokens: 1_000_000,
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelEntry>, AgoraError> {
        Ok(Provider::Gemini
            .profile()
            .models
            .iter()
            .map(|id| ModelEntry::new(*id, *id))
            .collect())
    }

    fn is_ready(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
