use crate::agents::AgentService;
use crate::config::Provider;
use crate::core::error::AgoraError;
use crate::core::message::{Conversation, ImageAttachment, Message};
use crate::manager::AIManager;
use crate::providers::SendOptions;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Command output for display only; nothing was sent.
    Notice(String),
    Assistant {
        text: String,
        /// Silent activation notice to show alongside the answer
        advisory: Option<String>,
    },
}

/// One conversation: the command engine runs first, then the orchestrator.
pub struct ChatSession {
    manager: AIManager,
    agents: AgentService,
    conversation: Conversation,
    system_prompt: String,
    provider: Option<Provider>,
}

impl ChatSession {
    pub fn new(manager: AIManager, agents: AgentService, system_prompt: impl Into<String>) -> Self {
        Self {
            manager,
            agents,
            conversation: Conversation::new(),
            system_prompt: system_prompt.into(),
            provider: None,
        }
    }

    pub async fn submit(
        &mut self,
        input: &str,
        attachments: Vec<ImageAttachment>,
    ) -> Result<Reply, AgoraError> {
        let outcome = self.agents.interpret(input);
        if outcome.is_display_only() {
            return Ok(Reply::Notice(outcome.message().unwrap_or_default()));
        }
        let advisory = outcome.message();

        self.conversation
            .push(Message::user(input).with_attachments(attachments));

        let options = SendOptions {
            provider: self.provider,
            system_prompt: Some(self.agents.merge_system_prompt(&self.system_prompt)),
            ..Default::default()
        };
        let text = self
            .manager
            .send_message(self.conversation.messages(), &options)
            .await?;

        self.conversation.push(Message::assistant(text.clone()));
        Ok(Reply::Assistant { text, advisory })
    }

    /// Routes later messages to `provider`, or to the manager's default when `None`.
    pub fn set_provider(&mut self, provider: Option<Provider>) -> Result<(), AgoraError> {
        if let Some(provider) = provider {
            if self.manager.get_service(Some(provider)).is_none() {
                return Err(AgoraError::Config(format!(
                    "{} is not configured",
                    provider.display_name()
                )));
            }
        }
        self.provider = provider;
        Ok(())
    }

    /// The provider the next message goes to.
    pub fn current_provider(&self) -> Option<Provider> {
        self.provider.or(self.manager.default_service())
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn manager(&self) -> &AIManager {
        &self.manager
    }

    pub fn agents(&self) -> &AgentService {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut AgentService {
        &mut self.agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MemoryStore;
    use crate::config::ProviderConfig;
    use crate::providers::factory::ProviderFactory;
    use crate::providers::transport::testing::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn session(transport: Arc<MockTransport>) -> ChatSession {
        let mut manager = AIManager::new(ProviderFactory::new(transport));
        manager
            .add_service(Provider::Anthropic, Some("k".into()), &ProviderConfig::default())
            .unwrap();
        manager
            .add_service(Provider::Cohere, Some("k".into()), &ProviderConfig::default())
            .unwrap();
        ChatSession::new(
            manager,
            AgentService::new(Box::new(MemoryStore::new())),
            "You are helpful.",
        )
    }

    #[tokio::test]
    async fn commands_never_reach_the_network() {
        let transport = MockTransport::new();
        let mut session = session(transport.clone());

        let reply = session.submit("/agent code-master", Vec::new()).await.unwrap();
        assert_eq!(reply, Reply::Notice("✨ Code Master activated".to_string()));
        assert_eq!(transport.call_count(), 0);
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn active_agent_is_merged_into_system_prompt() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({"content": [{"type": "text", "text": "fixed"}]}));
        let mut session = session(transport.clone());

        let reply = session
            .submit("ajude a debugar este código", Vec::new())
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Assistant {
                text: "fixed".to_string(),
                advisory: Some("🤖 Code Master activated silently".to_string()),
            }
        );

        let system = transport.last_body()["system"].as_str().unwrap().to_string();
        assert!(system.starts_with("You are helpful.\n\nYou are acting as: Code Master\n"));
        assert_eq!(session.conversation().len(), 2);
    }

    #[tokio::test]
    async fn selected_provider_is_used_and_errors_keep_the_user_turn() {
        let transport = MockTransport::new();
        transport.push_json(401, json!({"message": "invalid api token"}));
        transport.push_json(401, json!({"message": "invalid api token"}));
        let mut session = session(transport.clone());

        assert!(session.set_provider(Some(Provider::Gemini)).is_err());
        session.set_provider(Some(Provider::Cohere)).unwrap();
        assert_eq!(session.current_provider(), Some(Provider::Cohere));

        let err = session.submit("hello", Vec::new()).await.unwrap_err();
        assert!(matches!(err, AgoraError::InvalidCredential { .. }));
        assert_eq!(session.conversation().len(), 1);
        let requests = transport.requests();
        assert!(requests[0].url.ends_with("/chat"));
        assert!(requests[1].url.ends_with("/generate"));
    }
}
