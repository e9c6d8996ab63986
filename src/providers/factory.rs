use crate::config::{Provider, ProviderConfig};
use crate::core::error::AgoraError;
use crate::providers::transport::HttpTransport;
use crate::providers::{
    LLMProvider, anthropic::AnthropicProvider, cohere::CohereProvider, gemini::GeminiProvider,
    huggingface::HuggingFaceProvider, openai::OpenAIProvider,
};
use std::collections::HashMap;
use std::sync::Arc;

type ProviderCreator = Box<
    dyn Fn(Arc<dyn HttpTransport>, Option<String>, &ProviderConfig) -> Box<dyn LLMProvider>
        + Send
        + Sync,
>;

fn creator<P: LLMProvider + 'static>(
    ctor: fn(Arc<dyn HttpTransport>, Option<String>, &ProviderConfig) -> P,
) -> ProviderCreator {
    Box::new(
        move |transport: Arc<dyn HttpTransport>,
              api_key: Option<String>,
              config: &ProviderConfig|
              -> Box<dyn LLMProvider> { Box::new(ctor(transport, api_key, config)) },
    )
}

/// Dispatch table from provider id to adapter constructor.
pub struct ProviderFactory {
    transport: Arc<dyn HttpTransport>,
    creators: HashMap<Provider, ProviderCreator>,
}

impl ProviderFactory {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        let mut creators = HashMap::new();
        creators.insert(Provider::Gemini, creator(GeminiProvider::new));
        creators.insert(Provider::OpenAI, creator(OpenAIProvider::new));
        creators.insert(Provider::Anthropic, creator(AnthropicProvider::new));
        creators.insert(Provider::Cohere, creator(CohereProvider::new));
        creators.insert(Provider::HuggingFace, creator(HuggingFaceProvider::new));

        Self {
            transport,
            creators,
        }
    }

    /// An explicit key wins over the one stored in `config`.
    pub fn create(
        &self,
        provider: Provider,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Result<Box<dyn LLMProvider>, AgoraError> {
        let creator = self
            .creators
            .get(&provider)
            .ok_or_else(|| AgoraError::UnknownProvider(provider.to_string()))?;
        let api_key = api_key
            .or_else(|| config.api_key.clone())
            .filter(|key| !key.trim().is_empty());
        tracing::debug!(provider = %provider, has_key = api_key.is_some(), "creating adapter");
        Ok(creator(self.transport.clone(), api_key, config))
    }

    pub fn create_by_name(
        &self,
        name: &str,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Result<Box<dyn LLMProvider>, AgoraError> {
        let provider =
            Provider::from_str(name).ok_or_else(|| AgoraError::UnknownProvider(name.to_string()))?;
        self.create(provider, api_key, config)
    }

    /// Registered providers, in `Provider::ALL` order.
    pub fn available_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|provider| self.creators.contains_key(provider))
            .collect()
    }
}
