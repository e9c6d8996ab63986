use crate::config::{GenerationParams, Provider};
use crate::core::error::AgoraError;
use async_trait::async_trait;

pub use crate::core::message::{ImageAttachment, Message, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub provider_name: String,
    pub model_id: String,
    pub supports_images: bool,
    pub max_context_tokens: u32,
}

/// One row of a provider's model catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    /// Tier, family or short description when the vendor gives one
    pub tag: Option<String>,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tag: None,
        }
    }

    pub fn tagged(id: &str, name: &str, tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Self::new(id, name)
        }
    }
}

/// Per-call options shared by every adapter.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Route to this provider instead of the manager's default
    pub provider: Option<Provider>,
    pub system_prompt: Option<String>,
    /// Extra images for the final turn, after the ones on the message itself
    pub attachments: Vec<ImageAttachment>,
    /// Overrides for the configured decoding parameters
    pub params: GenerationParams,
}

impl SendOptions {
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn send_message(
        &self,
        history: &[Message],
        options: &SendOptions,
    ) -> Result<String, AgoraError>;

    fn model_info(&self) -> ModelInfo;

    /// Models this adapter can be configured with.
    async fn available_models(&self) -> Result<Vec<ModelEntry>, AgoraError>;

    /// True iff a non-empty credential is configured.
    fn is_ready(&self) -> bool;
}

/// Conversation turns sent to a vendor. System instructions travel through
/// `SendOptions::system_prompt`, so system-role entries are left out.
pub(crate) fn chat_turns(history: &[Message]) -> Vec<&Message> {
    history.iter().filter(|m| m.role() != Role::System).collect()
}

/// Images that travel with the final turn.
pub(crate) fn final_turn_images<'a>(
    turns: &[&'a Message],
    options: &'a SendOptions,
) -> Vec<&'a ImageAttachment> {
    turns
        .last()
        .copied()
        .map(|m| m.attachments.iter())
        .into_iter()
        .flatten()
        .chain(options.attachments.iter())
        .collect()
}

pub(crate) fn require_turns(provider: Provider, turns: &[&Message]) -> Result<(), AgoraError> {
    if turns.is_empty() {
        return Err(AgoraError::Input(format!(
            "Cannot send an empty conversation to {}",
            provider.display_name()
        )));
    }
    Ok(())
}

pub mod anthropic;
pub mod classify;
pub mod cohere;
pub mod factory;
pub mod gemini;
pub mod huggingface;
pub mod openai;
pub mod transport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_turn_images_prefer_message_then_options() {
        let on_message = ImageAttachment::new("a.png", "image/png", b"a").unwrap();
        let in_options = ImageAttachment::new("b.png", "image/png", b"b").unwrap();
        let history = vec![
            Message::user("first").with_attachments(vec![
                ImageAttachment::new("old.png", "image/png", b"o").unwrap(),
            ]),
            Message::user("look").with_attachments(vec![on_message.clone()]),
        ];
        let options = SendOptions {
            attachments: vec![in_options.clone()],
            ..Default::default()
        };

        let turns = chat_turns(&history);
        let images = final_turn_images(&turns, &options);
        assert_eq!(images, vec![&on_message, &in_options]);
    }

    #[test]
    fn system_entries_are_not_turns() {
        let history = vec![
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let turns = chat_turns(&history);
        assert_eq!(turns.len(), 2);
        assert!(turns[0].is_user());
    }

    #[test]
    fn blank_system_prompt_is_ignored() {
        let options = SendOptions {
            system_prompt: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(options.system_prompt(), None);
    }
}
