use super::agent::{Agent, COMMAND_AGENT_COLOR, is_builtin_id};
use super::outcome::Outcome;
use super::registry::CommandRegistry;
use super::service::AgentService;
use crate::core::error::AgoraError;
use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, service: &mut AgentService, args: &str) -> Result<Outcome, AgoraError>;
    fn help(&self) -> &'static str;
}

pub struct AgentCommand;
pub struct SwitchCommand;
pub struct ListCommand;
pub struct CreateCommand;
pub struct ResetCommand;

impl CommandHandler for AgentCommand {
    fn execute(&self, service: &mut AgentService, args: &str) -> Result<Outcome, AgoraError> {
        if args.is_empty() {
            return Ok(Outcome::ShowHelp(service.all_agents().to_vec()));
        }
        if service.find_agent(args).is_none() {
            return Ok(Outcome::Error(format!("Agent '{}' not found", args)));
        }
        service.activate_agent(args).map(Outcome::AgentActivated)
    }

    fn help(&self) -> &'static str {
        "/agent <id> - Activate an agent"
    }
}

impl CommandHandler for SwitchCommand {
    fn execute(&self, service: &mut AgentService, args: &str) -> Result<Outcome, AgoraError> {
        AgentCommand.execute(service, args)
    }

    fn help(&self) -> &'static str {
        "/switch <id> - Switch to another agent"
    }
}

impl CommandHandler for ListCommand {
    fn execute(&self, service: &mut AgentService, _args: &str) -> Result<Outcome, AgoraError> {
        Ok(Outcome::AgentList(service.all_agents().to_vec()))
    }

    fn help(&self) -> &'static str {
        "/list - List available agents"
    }
}

fn whitespace_runs() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// `name:description:prompt:icon[:keywords]`; keywords are comma separated.
pub fn parse_agent_definition(args: &str) -> Result<Agent, String> {
    let parts: Vec<&str> = args.split(':').collect();
    if parts.len() < 4 {
        return Err("Invalid format. Use: name:description:prompt:icon[:keywords]".to_string());
    }

    let name = parts[0].trim();
    if name.is_empty() {
        return Err("Agent name cannot be empty".to_string());
    }
    let id = whitespace_runs()
        .replace_all(&name.to_lowercase(), "-")
        .into_owned();

    let keywords = parts
        .get(4)
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|keyword| !keyword.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Agent {
        id,
        name: name.to_string(),
        description: parts[1].trim().to_string(),
        prompt: parts[2].trim().to_string(),
        icon: parts[3].trim().to_string(),
        keywords,
        color: COMMAND_AGENT_COLOR.to_string(),
        custom: true,
        created_at: Some(Utc::now()),
    })
}

impl CommandHandler for CreateCommand {
    fn execute(&self, service: &mut AgentService, args: &str) -> Result<Outcome, AgoraError> {
        if args.is_empty() {
            return Ok(Outcome::CreateHelp);
        }

        let agent = match parse_agent_definition(args) {
            Ok(agent) => agent,
            Err(message) => return Ok(Outcome::Error(message)),
        };
        if is_builtin_id(&agent.id) {
            return Ok(Outcome::Error(format!(
                "'{}' is a built-in agent and cannot be replaced",
                agent.id
            )));
        }

        service.insert_custom_agent(agent.clone())?;
        Ok(Outcome::AgentCreated(agent))
    }

    fn help(&self) -> &'static str {
        "/create name:description:prompt:icon[:keywords] - Create a custom agent"
    }
}

impl CommandHandler for ResetCommand {
    fn execute(&self, service: &mut AgentService, _args: &str) -> Result<Outcome, AgoraError> {
        service.deactivate_agent()?;
        Ok(Outcome::Deactivated)
    }

    fn help(&self) -> &'static str {
        "/reset - Return to the default assistant"
    }
}

pub fn create_command_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register("agent", AgentCommand);
    registry.register("switch", SwitchCommand);
    registry.register("list", ListCommand);
    registry.register("create", CreateCommand);
    registry.register("reset", ResetCommand);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_with_keywords() {
        let agent = parse_agent_definition("Rust Guru:Knows Rust:Answer like a rustacean:🦀: borrow , lifetime,,").unwrap();
        assert_eq!(agent.id, "rust-guru");
        assert_eq!(agent.name, "Rust Guru");
        assert_eq!(agent.icon, "🦀");
        assert_eq!(agent.keywords, vec!["borrow", "lifetime"]);
        assert!(agent.custom);
        assert_eq!(agent.color, COMMAND_AGENT_COLOR);
    }

    #[test]
    fn keywords_are_optional() {
        let agent = parse_agent_definition("Foo:desc:prompt:🙂").unwrap();
        assert!(agent.keywords.is_empty());
    }

    #[test]
    fn too_few_fields_or_blank_name_is_rejected() {
        assert!(parse_agent_definition("Foo:desc").is_err());
        assert!(parse_agent_definition("  :desc:prompt:🙂").is_err());
    }

    #[test]
    fn registry_requires_word_boundary() {
        let registry = create_command_registry();
        let (handler, args) = registry.find("  /agent   code-master ").unwrap();
        assert_eq!(handler.help(), AgentCommand.help());
        assert_eq!(args, "code-master");
        assert!(registry.find("/reset").is_some());
        assert!(registry.find("/agents").is_none());
        assert!(registry.find("/listing").is_none());
        assert!(registry.find("agent code-master").is_none());
        assert_eq!(
            registry.get_command_names(),
            vec!["agent", "switch", "list", "create", "reset"]
        );
    }
}
