use crate::config::{Config, Provider, ProviderConfig};
use crate::core::error::AgoraError;
use crate::providers::factory::ProviderFactory;
use crate::providers::{LLMProvider, Message, ModelEntry, SendOptions};

/// Owns the configured adapters and routes each request to one of them.
pub struct AIManager {
    factory: ProviderFactory,
    /// Insertion order is kept so the fallback default is deterministic.
    services: Vec<Box<dyn LLMProvider>>,
    default: Option<Provider>,
}

impl AIManager {
    pub fn new(factory: ProviderFactory) -> Self {
        Self {
            factory,
            services: Vec::new(),
            default: None,
        }
    }

    /// Adds every provider with a usable credential, in `Provider::ALL` order,
    /// then applies the configured default.
    pub fn from_config(config: &Config, factory: ProviderFactory) -> Self {
        let mut manager = Self::new(factory);
        for provider in Provider::ALL {
            let provider_config = config.provider_config(provider);
            let Some(api_key) = provider_config.resolve_api_key(provider) else {
                tracing::debug!(provider = %provider, "no credential, skipping");
                continue;
            };
            if let Err(e) = manager.add_service(provider, Some(api_key), &provider_config) {
                tracing::warn!(provider = %provider, "could not add service: {}", e);
            }
        }
        if let Some(provider) = config.default_provider {
            manager.set_default_service(provider);
        }
        manager
    }

    /// The first service added becomes the default. Adding a provider that is
    /// already configured replaces its adapter in place.
    pub fn add_service(
        &mut self,
        provider: Provider,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Result<(), AgoraError> {
        let service = self.factory.create(provider, api_key, config)?;
        match self.position(provider) {
            Some(index) => self.services[index] = service,
            None => self.services.push(service),
        }
        if self.default.is_none() {
            self.default = Some(provider);
        }
        tracing::info!(provider = %provider, "service added");
        Ok(())
    }

    pub fn add_service_by_name(
        &mut self,
        name: &str,
        api_key: Option<String>,
        config: &ProviderConfig,
    ) -> Result<Provider, AgoraError> {
        let provider =
            Provider::from_str(name).ok_or_else(|| AgoraError::UnknownProvider(name.to_string()))?;
        self.add_service(provider, api_key, config)?;
        Ok(provider)
    }

    /// Returns false when the provider was not configured.
    pub fn remove_service(&mut self, provider: Provider) -> bool {
        let Some(index) = self.position(provider) else {
            return false;
        };
        self.services.remove(index);
        if self.default == Some(provider) {
            self.default = self.services.first().map(|service| service.provider());
        }
        tracing::info!(provider = %provider, "service removed");
        true
    }

    /// The requested service, or the default one when `provider` is `None`.
    pub fn get_service(&self, provider: Option<Provider>) -> Option<&dyn LLMProvider> {
        let provider = provider.or(self.default)?;
        self.services
            .iter()
            .find(|service| service.provider() == provider)
            .map(|service| service.as_ref())
    }

    pub fn active_services(&self) -> Vec<Provider> {
        self.services.iter().map(|service| service.provider()).collect()
    }

    pub fn has_active_services(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn default_service(&self) -> Option<Provider> {
        self.default
    }

    pub fn set_default_service(&mut self, provider: Provider) {
        if self.position(provider).is_some() {
            self.default = Some(provider);
        } else {
            tracing::debug!(provider = %provider, "not configured, default unchanged");
        }
    }

    pub async fn send_message(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<String, AgoraError> {
        let service = self
            .get_service(options.provider)
            .ok_or(AgoraError::NoActiveService)?;
        tracing::debug!(
            provider = %service.provider(),
            turns = history.len(),
            "sending message"
        );
        service.send_message(history, options).await
    }

    /// Catalog of the requested service, or of the default one.
    pub async fn available_models(
        &self,
        provider: Option<Provider>,
    ) -> Result<Vec<ModelEntry>, AgoraError> {
        let service = self
            .get_service(provider)
            .ok_or(AgoraError::NoActiveService)?;
        service.available_models().await
    }

    fn position(&self, provider: Provider) -> Option<usize> {
        self.services
            .iter()
            .position(|service| service.provider() == provider)
    }
}
