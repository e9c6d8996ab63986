use crate::core::error::AgoraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAI,
    Anthropic,
    Cohere,
    HuggingFace,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Gemini,
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::Cohere,
        Provider::HuggingFace,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Provider::Gemini),
            "openai" => Some(Provider::OpenAI),
            "anthropic" => Some(Provider::Anthropic),
            "cohere" => Some(Provider::Cohere),
            "huggingface" => Some(Provider::HuggingFace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Cohere => "cohere",
            Provider::HuggingFace => "huggingface",
        }
    }

    pub fn display_name(&self) -> &'static str {
        self.profile().name
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Cohere => "https://api.cohere.ai/v1",
            Provider::HuggingFace => "https://api-inference.huggingface.co/models",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-1.5-flash",
            Provider::OpenAI => "gpt-3.5-turbo",
            Provider::Anthropic => "claude-3-sonnet-20240229",
            Provider::Cohere => "command",
            Provider::HuggingFace => "microsoft/DialoGPT-medium",
        }
    }

    /// Environment variable consulted when the config has no key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Cohere => "COHERE_API_KEY",
            Provider::HuggingFace => "HUGGINGFACE_API_KEY",
        }
    }

    pub fn default_max_tokens(&self) -> u32 {
        match self {
            Provider::HuggingFace => 1024,
            _ => 4096,
        }
    }

    pub fn profile(&self) -> &'static ProviderProfile {
        match self {
            Provider::Gemini => &PROVIDER_PROFILES[0],
            Provider::OpenAI => &PROVIDER_PROFILES[1],
            Provider::Anthropic => &PROVIDER_PROFILES[2],
            Provider::Cohere => &PROVIDER_PROFILES[3],
            Provider::HuggingFace => &PROVIDER_PROFILES[4],
        }
    }
}

/// Static description of a vendor, shown before any adapter is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider: Provider,
    pub name: &'static str,
    /// Suggested models, preferred first
    pub models: &'static [&'static str],
    pub supports_images: bool,
    pub max_context_tokens: u32,
}

pub const PROVIDER_PROFILES: [ProviderProfile; 5] = [
    ProviderProfile {
        provider: Provider::Gemini,
        name: "Google Gemini",
        models: &["gemini-1.5-flash", "gemini-1.5-pro"],
        supports_images: true,
        max_context_tokens: 1_000_000,
    },
    ProviderProfile {
        provider: Provider::OpenAI,
        name: "OpenAI",
        models: &["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo"],
        supports_images: true,
        max_context_tokens: 128_000,
    },
    ProviderProfile {
        provider: Provider::Anthropic,
        name: "Anthropic Claude",
        models: &["claude-3-opus", "claude-3-sonnet", "claude-3-haiku"],
        supports_images: true,
        max_context_tokens: 200_000,
    },
    ProviderProfile {
        provider: Provider::Cohere,
        name: "Cohere",
        models: &["command", "command-light"],
        supports_images: false,
        max_context_tokens: 4096,
    },
    ProviderProfile {
        provider: Provider::HuggingFace,
        name: "Hugging Face",
        models: &["mistral-7b", "llama-2-7b", "code-llama"],
        supports_images: false,
        max_context_tokens: 4096,
    },
];

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoding parameters passed through verbatim into the wire payload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

impl GenerationParams {
    /// Values set in `overrides` win.
    pub fn merged_with(&self, overrides: &GenerationParams) -> GenerationParams {
        GenerationParams {
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
        }
    }

    pub fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(0.7)
    }

    pub fn max_tokens_for(&self, provider: Provider) -> u32 {
        self.max_tokens
            .unwrap_or_else(|| provider.default_max_tokens())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
    /// HuggingFace only: ask the inference API to hold the request while the model loads
    #[serde(default = "default_true")]
    pub wait_for_model: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: None,
            params: GenerationParams::default(),
            wait_for_model: true,
        }
    }
}

impl ProviderConfig {
    /// Config key first, then the provider's environment variable.
    pub fn resolve_api_key(&self, provider: Provider) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(provider.api_key_env()).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_provider: Option<Provider>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub providers: HashMap<Provider, ProviderConfig>,
}

impl Config {
    fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agora")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Location of the agent catalog / history store.
    pub fn state_path() -> PathBuf {
        Self::config_dir().join("state.json")
    }

    pub fn input_history_path() -> PathBuf {
        Self::config_dir().join("input_history.txt")
    }

    pub fn load() -> Result<Config, AgoraError> {
        let path = Self::config_path();
        if path.exists() {
            return Self::load_from(&path);
        }

        let config = Config::default();
        if let Err(e) = config.save_to(&path) {
            tracing::warn!("Could not write default config to {}: {}", path.display(), e);
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Config, AgoraError> {
        let contents = fs::read_to_string(path)?;
        serde_yml::from_str::<Config>(&contents)
            .map_err(|e| AgoraError::Config(format!("Parse {}: {}", path.display(), e)))
    }

    pub fn save(&self) -> Result<(), AgoraError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AgoraError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(path, yaml_content)?;
        Ok(())
    }

    pub fn provider_config(&self, provider: Provider) -> ProviderConfig {
        self.providers.get(&provider).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_line_up_with_providers() {
        for provider in Provider::ALL {
            let profile = provider.profile();
            assert_eq!(profile.provider, provider);
            assert!(!profile.models.is_empty());
        }
        assert_eq!(Provider::OpenAI.profile().max_context_tokens, 128_000);
        assert!(!Provider::Cohere.profile().supports_images);
        assert_eq!(Provider::Anthropic.display_name(), "Anthropic Claude");
    }

    #[test]
    fn provider_names_round_trip() {
        for provider in Provider::ALL {
            assert_eq!(Provider::from_str(provider.as_str()), Some(provider));
        }
        assert_eq!(Provider::from_str("HuggingFace"), Some(Provider::HuggingFace));
        assert_eq!(Provider::from_str("mistral"), None);
    }

    #[test]
    fn overrides_win_when_merging_params() {
        let base = GenerationParams {
            temperature: Some(0.2),
            max_tokens: Some(100),
            ..Default::default()
        };
        let overrides = GenerationParams {
            temperature: Some(0.9),
            top_p: Some(0.5),
            ..Default::default()
        };

        let merged = base.merged_with(&overrides);
        assert_eq!(merged.temperature, Some(0.9));
        assert_eq!(merged.max_tokens, Some(100));
        assert_eq!(merged.top_p, Some(0.5));
        assert_eq!(merged.max_tokens_for(Provider::Cohere), 100);
        assert_eq!(
            GenerationParams::default().max_tokens_for(Provider::HuggingFace),
            1024
        );
    }

    #[test]
    fn yaml_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "default_provider: cohere\nproviders:\n  cohere:\n    api_key: abc\n    model: command-light\n    temperature: 0.3\n  huggingface:\n    wait_for_model: false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_provider, Some(Provider::Cohere));
        let cohere = config.provider_config(Provider::Cohere);
        assert_eq!(cohere.model.as_deref(), Some("command-light"));
        assert_eq!(cohere.params.temperature, Some(0.3));
        assert!(cohere.wait_for_model);
        assert!(!config.provider_config(Provider::HuggingFace).wait_for_model);

        config.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(
            reloaded.provider_config(Provider::Cohere).api_key.as_deref(),
            Some("abc")
        );
    }
}
