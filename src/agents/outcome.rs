use super::agent::Agent;

pub const CREATE_USAGE: &str = "/create name:description:prompt:icon[:keywords]";

/// Result of interpreting one line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    AgentActivated(Agent),
    AgentList(Vec<Agent>),
    AgentCreated(Agent),
    CreateHelp,
    Deactivated,
    /// `/agent` without an id: the catalog with switch hints
    ShowHelp(Vec<Agent>),
    Error(String),
    /// Keyword-triggered switch; the input still goes to the model.
    SilentActivation(Agent),
    PassThrough {
        agent_prompt: Option<String>,
    },
}

impl Outcome {
    /// True when the caller should show `message()` and skip the model call.
    pub fn is_display_only(&self) -> bool {
        !matches!(
            self,
            Outcome::SilentActivation(_) | Outcome::PassThrough { .. }
        )
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Outcome::AgentActivated(agent) => Some(format!("✨ {} activated", agent.name)),
            Outcome::AgentList(agents) => {
                let mut lines = vec![format!("🎯 {} agents available", agents.len())];
                lines.extend(agents.iter().map(Agent::summary));
                Some(lines.join("\n"))
            }
            Outcome::AgentCreated(agent) => {
                Some(format!("✅ Agent '{}' created ({})", agent.name, agent.id))
            }
            Outcome::CreateHelp => Some(format!("💡 Usage: {}", CREATE_USAGE)),
            Outcome::Deactivated => Some("🔄 Back to the default assistant".to_string()),
            Outcome::ShowHelp(agents) => {
                let mut lines = vec!["📋 Available agents:".to_string()];
                lines.extend(
                    agents
                        .iter()
                        .map(|agent| format!("{} {} - /switch {}", agent.icon, agent.name, agent.id)),
                );
                Some(lines.join("\n"))
            }
            Outcome::Error(message) => Some(format!("❌ {}", message)),
            Outcome::SilentActivation(agent) => {
                Some(format!("🤖 {} activated silently", agent.name))
            }
            Outcome::PassThrough { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::agent::builtin_agents;

    #[test]
    fn only_model_bound_outcomes_are_not_display_only() {
        let agent = builtin_agents().remove(0);
        assert!(Outcome::AgentActivated(agent.clone()).is_display_only());
        assert!(Outcome::CreateHelp.is_display_only());
        assert!(Outcome::Error("x".into()).is_display_only());
        assert!(!Outcome::SilentActivation(agent).is_display_only());
        assert!(!Outcome::PassThrough { agent_prompt: None }.is_display_only());
    }

    #[test]
    fn show_help_lists_switch_hints() {
        let message = Outcome::ShowHelp(builtin_agents()).message().unwrap();
        assert!(message.starts_with("📋 Available agents:"));
        assert!(message.contains("/switch data-analyst"));
        assert_eq!(Outcome::PassThrough { agent_prompt: None }.message(), None);
    }
}
