use crate::config::Provider;
use std::io;
use thiserror::Error;

/// Unified error type for agora
#[derive(Error, Debug)]
pub enum AgoraError {
    /// The adapter has no credential; raised before any network call
    #[error("{} API key is not configured", .0.display_name())]
    MissingCredential(Provider),

    /// The vendor rejected the configured key
    #[error("{} rejected the API key: {message}", .provider.display_name())]
    InvalidCredential { provider: Provider, message: String },

    /// Quota or rate exhaustion
    #[error("{} rate limit reached: {message}", .provider.display_name())]
    RateLimited {
        provider: Provider,
        message: String,
        retry_after: Option<u64>,
    },

    /// Model loading, overloaded or otherwise temporarily unavailable
    #[error("{} is temporarily unavailable: {message}", .provider.display_name())]
    TransientUnavailable {
        provider: Provider,
        message: String,
        retry_after: Option<u64>,
    },

    /// HTTP succeeded but the payload did not have the expected shape
    #[error("Invalid response from {}: {message}", .provider.display_name())]
    InvalidResponse { provider: Provider, message: String },

    /// Transport-level failure (DNS, timeout, connection reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Vendor error that matched no more specific kind
    #[error("{} API error (HTTP {status}): {message}", .provider.display_name())]
    Api {
        provider: Provider,
        status: u16,
        message: String,
    },

    #[error("AI provider '{0}' not found")]
    UnknownProvider(String),

    #[error("No AI service configured")]
    NoActiveService,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input errors
    #[error("Input error: {0}")]
    Input(String),

    /// Key-value store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl AgoraError {
    /// Whether a caller-level retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgoraError::RateLimited { .. }
                | AgoraError::TransientUnavailable { .. }
                | AgoraError::Network(_)
        )
    }

    pub fn invalid_response(provider: Provider, message: impl Into<String>) -> Self {
        AgoraError::InvalidResponse {
            provider,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for AgoraError {
    /// The URL is stripped: it can carry credentials.
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            AgoraError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            AgoraError::Network(format!("Connection failed: {}", err))
        } else {
            AgoraError::Network(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for AgoraError {
    fn from(err: serde_json::Error) -> Self {
        AgoraError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for AgoraError {
    fn from(err: serde_yml::Error) -> Self {
        AgoraError::Serialization(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(
            AgoraError::RateLimited {
                provider: Provider::OpenAI,
                message: "slow down".into(),
                retry_after: Some(3),
            }
            .is_retryable()
        );
        assert!(AgoraError::Network("reset".into()).is_retryable());
        assert!(!AgoraError::MissingCredential(Provider::Cohere).is_retryable());
        assert!(!AgoraError::NoActiveService.is_retryable());
    }

    #[test]
    fn messages_name_the_provider() {
        let err = AgoraError::MissingCredential(Provider::HuggingFace);
        assert_eq!(err.to_string(), "Hugging Face API key is not configured");
    }
}
