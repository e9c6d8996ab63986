//! Maps vendor failures onto the canonical error kinds.

use crate::config::Provider;
use crate::core::error::AgoraError;
use crate::providers::transport::HttpResponse;
use serde_json::Value;

/// Header that reports remaining requests, when the vendor sends one.
fn rate_limit_header(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::OpenAI => Some("x-ratelimit-remaining-requests"),
        Provider::Anthropic => Some("anthropic-ratelimit-requests-remaining"),
        _ => None,
    }
}

/// Pulls the human-readable message out of a vendor error body.
pub fn vendor_message(provider: Provider, response: &HttpResponse) -> String {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();
    let message = parsed.as_ref().and_then(|body| match provider {
        Provider::Gemini | Provider::OpenAI | Provider::Anthropic => body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| body.get("message").and_then(Value::as_str)),
        Provider::Cohere => body.get("message").and_then(Value::as_str),
        Provider::HuggingFace => body
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| body.pointer("/error/message").and_then(Value::as_str)),
    });

    match message {
        Some(m) if !m.trim().is_empty() => m.to_string(),
        _ => format!("HTTP {}", response.status),
    }
}

fn header_secs(response: &HttpResponse, name: &str) -> Option<u64> {
    response
        .header(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| secs.ceil() as u64)
}

/// Classifies a non-2xx response.
pub fn classify(provider: Provider, response: &HttpResponse) -> AgoraError {
    let message = vendor_message(provider, response);
    let lower = message.to_lowercase();
    let status = response.status;

    let header_exhausted = rate_limit_header(provider)
        .and_then(|name| response.header(name))
        .is_some_and(|v| v.trim() == "0");

    let err = if status == 401
        || status == 403
        || lower.contains("api key")
        || lower.contains("api_key")
    {
        AgoraError::InvalidCredential { provider, message }
    } else if status == 429 || header_exhausted || lower.contains("quota") || lower.contains("limit")
    {
        AgoraError::RateLimited {
            provider,
            message,
            retry_after: header_secs(response, "retry-after"),
        }
    } else if status == 503
        || status == 529
        || lower.contains("loading")
        || lower.contains("overloaded")
    {
        let estimated = serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|body| body.get("estimated_time").and_then(Value::as_f64))
            .map(|secs| secs.ceil() as u64);
        AgoraError::TransientUnavailable {
            provider,
            message,
            retry_after: estimated.or_else(|| header_secs(response, "retry-after")),
        }
    } else {
        AgoraError::Api {
            provider,
            status,
            message,
        }
    };

    tracing::warn!(provider = %provider, status, "request failed: {}", err);
    err
}

/// Returns the response when it is 2xx, the classified error otherwise.
pub fn ensure_success(
    provider: Provider,
    response: HttpResponse,
) -> Result<HttpResponse, AgoraError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(classify(provider, &response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn response(status: u16, headers: &[(&str, &str)], body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            body: body.to_string(),
        }
    }

    #[test]
    fn unauthorized_is_invalid_credential() {
        let err = classify(
            Provider::OpenAI,
            &response(401, &[], json!({"error": {"message": "Incorrect key"}})),
        );
        assert!(matches!(err, AgoraError::InvalidCredential { .. }));
    }

    #[test]
    fn api_key_mention_is_invalid_credential() {
        let err = classify(
            Provider::Gemini,
            &response(
                400,
                &[],
                json!({"error": {"message": "API key not valid. Please pass a valid API key."}}),
            ),
        );
        assert!(matches!(err, AgoraError::InvalidCredential { .. }));
    }

    #[test]
    fn too_many_requests_carries_retry_after() {
        let err = classify(
            Provider::Cohere,
            &response(429, &[("retry-after", "7")], json!({"message": "slow down"})),
        );
        match err {
            AgoraError::RateLimited { retry_after, .. } => assert_eq!(retry_after, Some(7)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn exhausted_rate_limit_header() {
        let err = classify(
            Provider::Anthropic,
            &response(
                400,
                &[("anthropic-ratelimit-requests-remaining", "0")],
                json!({"error": {"message": "bad"}}),
            ),
        );
        assert!(matches!(err, AgoraError::RateLimited { .. }));
    }

    #[test]
    fn quota_message_is_rate_limited() {
        let err = classify(
            Provider::Gemini,
            &response(400, &[], json!({"error": {"message": "Quota exceeded"}})),
        );
        assert!(matches!(err, AgoraError::RateLimited { .. }));
    }

    #[test]
    fn model_loading_is_transient() {
        let err = classify(
            Provider::HuggingFace,
            &response(
                503,
                &[],
                json!({"error": "Model is currently loading", "estimated_time": 19.6}),
            ),
        );
        match err {
            AgoraError::TransientUnavailable { retry_after, .. } => {
                assert_eq!(retry_after, Some(20))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn overloaded_anthropic_is_transient() {
        let err = classify(
            Provider::Anthropic,
            &response(529, &[], json!({"error": {"message": "Overloaded"}})),
        );
        assert!(matches!(err, AgoraError::TransientUnavailable { .. }));
    }

    #[test]
    fn other_failures_keep_status() {
        let err = classify(Provider::OpenAI, &response(500, &[], json!("oops")));
        match err {
            AgoraError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 500);
                assert_eq!(message, "HTTP 500");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
