use crate::config::{GenerationParams, Provider};
use crate::core::error::AgoraError;
use crate::providers::classify::ensure_success;
use crate::providers::gemini::types::*;
use crate::providers::transport::{HttpClient, HttpTransport};
use crate::providers::{
    Message, Role, SendOptions, chat_turns, final_turn_images, require_turns,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct GeminiClient {
    pub model: String,
    client: HttpClient,
}

impl GeminiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: String,
        api_key: String,
        model: String,
    ) -> Self {
        // The key travels in a header, never in the URL
        let client = HttpClient::new(
            transport,
            base_url,
            Some(("x-goog-api-key".to_string(), api_key)),
            None,
        );

        Self { client, model }
    }

    pub async fn generate_content(
        &self,
        history: &[Message],
        options: &SendOptions,
        params: &GenerationParams,
    ) -> Result<String, AgoraError> {
        let payload = build_payload(history, options, params)?;
        let response = self
            .client
            .post(
                &format!("v1beta/models/{}:generateContent", self.model),
                &payload,
            )
            .await?;

        let response = ensure_success(Provider::Gemini, response)?;
        parse_response(&response.body)
    }
}

/// History before the final turn seeds the chat; the final turn carries the
/// system prompt inline and any images as `inlineData` parts.
pub fn build_payload(
    history: &[Message],
    options: &SendOptions,
    params: &GenerationParams,
) -> Result<GeminiRequest, AgoraError> {
    let turns = chat_turns(history);
    require_turns(Provider::Gemini, &turns)?;

    let (last, earlier) = turns
        .split_last()
        .ok_or_else(|| AgoraError::Input("Empty conversation".to_string()))?;

    let mut contents: Vec<GeminiContentPart> = earlier
        .iter()
        .map(|message| GeminiContentPart {
            role: gemini_role(message.role()).to_string(),
            parts: vec![GeminiPart::text(message.text.clone())],
        })
        .collect();

    let prompt = match options.system_prompt() {
        Some(system) => format!("{}\n\n{}", system, last.text),
        None => last.text.clone(),
    };
    let mut parts = vec![GeminiPart::text(prompt)];
    parts.extend(
        final_turn_images(&turns, options)
            .into_iter()
            .map(|image| GeminiPart::inline(&image.mime_type, &image.data)),
    );
    contents.push(GeminiContentPart {
        role: gemini_role(last.role()).to_string(),
        parts,
    });

    Ok(GeminiRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: params.temperature_or_default(),
            max_output_tokens: params.max_tokens_for(Provider::Gemini),
            top_p: params.top_p,
        },
    })
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        _ => "model",
    }
}

pub fn parse_response(body: &str) -> Result<String, AgoraError> {
    let parsed: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        AgoraError::invalid_response(
            Provider::Gemini,
            format!("Failed to parse Gemini response: {}", e),
        )
    })?;

    let text: String = parsed
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(AgoraError::invalid_response(
            Provider::Gemini,
            "No valid response from Gemini",
        ));
    }
    Ok(text)
}
