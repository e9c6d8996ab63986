use crate::cli::Args;
use crate::display;
use crate::input;
use agora::config::{Config, Provider};
use agora::core::error::AgoraError;
use agora::core::message::ImageAttachment;
use agora::session::{ChatSession, Reply};
use console::style;
use is_terminal::IsTerminal;
use std::io::{self, Read};

/// Commands handled by the terminal itself rather than the agent engine.
const HOST_COMMANDS: [(&str, &str); 6] = [
    ("quit", "/quit - Exit the chat session"),
    ("help", "/help - Show available commands"),
    ("clear", "/clear - Clear conversation history"),
    ("provider", "/provider [id] - Show or change the provider"),
    ("providers", "/providers - List configured providers"),
    ("models", "/models [id] - List models of a provider"),
];

/// Applies `--provider` and `--model` on top of the loaded config.
pub fn apply_overrides(config: &mut Config, args: &Args) -> Result<(), AgoraError> {
    let provider = match args.provider.as_deref() {
        Some(name) => {
            let provider = Provider::from_str(name)
                .ok_or_else(|| AgoraError::UnknownProvider(name.to_string()))?;
            config.default_provider = Some(provider);
            Some(provider)
        }
        None => config.default_provider,
    };

    if let Some(model) = &args.model {
        let provider = provider.unwrap_or(Provider::Gemini);
        config.providers.entry(provider).or_default().model = Some(model.clone());
        config.default_provider = Some(provider);
    }
    Ok(())
}

/// Chat mode leaves stdin to the line editor.
pub fn should_read_stdin(chat: bool, stdin_is_terminal: bool) -> bool {
    !chat && !stdin_is_terminal
}

/// Puts piped input ahead of the query.
pub fn compose_query(query: Option<&str>, context: Option<String>) -> Option<String> {
    match (query, context) {
        (Some(q), Some(ctx)) => Some(format!("<pipe>{}</pipe>\n\n{}", ctx, q)),
        (None, Some(ctx)) => Some(format!("<pipe>{}</pipe>", ctx)),
        (Some(q), None) => Some(q.to_string()),
        (None, None) => None,
    }
}

pub struct Application {
    args: Args,
    session: ChatSession,
}

impl Application {
    pub fn new(args: Args, session: ChatSession) -> Self {
        Self { args, session }
    }

    pub async fn run(&mut self) -> Result<(), AgoraError> {
        let context = if should_read_stdin(self.args.chat, io::stdin().is_terminal()) {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| AgoraError::Input(format!("Failed to read from stdin: {}", e)))?;
            Some(buffer).filter(|b| !b.trim().is_empty())
        } else {
            None
        };

        let attachments = self
            .args
            .images
            .iter()
            .map(|path| ImageAttachment::from_path(path))
            .collect::<Result<Vec<_>, _>>()?;

        if self.args.chat {
            self.handle_chat_mode(attachments).await
        } else {
            let query = compose_query(self.args.query.as_deref(), context)
                .ok_or_else(|| AgoraError::Input("No query provided".to_string()))?;
            self.handle_single_query(&query, attachments).await
        }
    }

    async fn handle_single_query(
        &mut self,
        query: &str,
        attachments: Vec<ImageAttachment>,
    ) -> Result<(), AgoraError> {
        let reply = self.session.submit(query, attachments).await?;
        self.show_reply(reply);
        Ok(())
    }

    fn show_reply(&self, reply: Reply) {
        match reply {
            Reply::Notice(message) => display::display_notice(&message),
            Reply::Assistant { text, advisory } => {
                if let Some(advisory) = advisory {
                    display::display_advisory(&advisory);
                }
                if display::looks_like_markdown(&text) {
                    display::display_markdown(&text);
                } else {
                    display::display_response(&text, self.session.current_provider());
                }
            }
        }
    }

    async fn handle_chat_mode(
        &mut self,
        mut attachments: Vec<ImageAttachment>,
    ) -> Result<(), AgoraError> {
        let mut commands: Vec<String> = HOST_COMMANDS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        commands.extend(self.session.agents().command_names());

        println!(
            "Entering chat mode. Type '/help' for available commands. Press Ctrl+D or type /quit to exit."
        );
        if let Some(agent) = self.session.agents().active_agent() {
            display::display_notice(&format!("{} {} is active", agent.icon, agent.name));
        }

        let mut editor = input::create_editor(commands)?;

        loop {
            let input = match input::read_input(&mut editor)? {
                Some(input) => input.trim().to_string(),
                None => break,
            };

            if input.is_empty() {
                continue;
            }

            if let Some(command) = input.strip_prefix('/') {
                let mut parts = command.split_whitespace();
                let name = parts.next().unwrap_or_default();
                let arg = parts.next();
                match name {
                    "quit" => break,
                    "help" => {
                        self.show_help();
                        continue;
                    }
                    "clear" => {
                        self.session.clear();
                        display::display_notice("Chat history cleared.");
                        continue;
                    }
                    "providers" => {
                        display::display_providers(
                            &self.session.manager().active_services(),
                            self.session.current_provider(),
                        );
                        continue;
                    }
                    "provider" => {
                        self.switch_provider(arg);
                        continue;
                    }
                    "models" => {
                        self.show_models(arg).await;
                        continue;
                    }
                    _ => {}
                }
            }

            match self
                .session
                .submit(&input, std::mem::take(&mut attachments))
                .await
            {
                Ok(reply) => self.show_reply(reply),
                Err(e) => display::display_error(&e),
            }
        }

        input::save_history(&mut editor)?;
        Ok(())
    }

    fn switch_provider(&mut self, arg: Option<&str>) {
        let Some(name) = arg else {
            match self.session.current_provider() {
                Some(provider) => display::display_notice(&format!(
                    "Current provider: {} ({})",
                    provider.display_name(),
                    provider
                )),
                None => display::display_notice("No provider configured."),
            }
            return;
        };

        let result = Provider::from_str(name)
            .ok_or_else(|| AgoraError::UnknownProvider(name.to_string()))
            .and_then(|provider| {
                self.session.set_provider(Some(provider))?;
                Ok(provider)
            });
        match result {
            Ok(provider) => display::display_notice(&format!(
                "Provider changed to: {}",
                provider.display_name()
            )),
            Err(e) => display::display_error(&e),
        }
    }

    async fn show_models(&self, arg: Option<&str>) {
        let provider = match arg {
            Some(name) => match Provider::from_str(name) {
                Some(provider) => Some(provider),
                None => {
                    display::display_error(&AgoraError::UnknownProvider(name.to_string()));
                    return;
                }
            },
            None => self.session.current_provider(),
        };

        let manager = self.session.manager();
        let Some(service) = manager.get_service(provider) else {
            display::display_error(&AgoraError::NoActiveService);
            return;
        };
        match manager.available_models(Some(service.provider())).await {
            Ok(models) => display::display_models(
                service.provider(),
                &models,
                &service.model_info().model_id,
            ),
            Err(e) => display::display_error(&e),
        }
    }

    fn show_help(&self) {
        let title = style("Available Commands").bold().underlined();
        let mut lines = vec![title.to_string()];
        lines.extend(HOST_COMMANDS.iter().map(|(_, usage)| usage.to_string()));
        lines.extend(
            self.session
                .agents()
                .command_usages()
                .into_iter()
                .map(str::to_string),
        );
        println!("{}", lines.join("\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn piped_context_precedes_query() {
        assert_eq!(
            compose_query(Some("summarize"), Some("log line".into())).as_deref(),
            Some("<pipe>log line</pipe>\n\nsummarize")
        );
        assert_eq!(compose_query(None, None), None);
    }

    #[test]
    fn piped_stdin_is_only_read_for_single_queries() {
        assert!(should_read_stdin(false, false));
        assert!(!should_read_stdin(true, false));
        assert!(!should_read_stdin(false, true));
        assert!(!should_read_stdin(true, true));
    }

    #[test]
    fn overrides_select_provider_and_model() {
        let mut config = Config::default();
        let args = Args::try_parse_from(["agora", "-p", "anthropic", "-m", "claude-3-haiku", "hi"])
            .unwrap();
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.default_provider, Some(Provider::Anthropic));
        assert_eq!(
            config.provider_config(Provider::Anthropic).model.as_deref(),
            Some("claude-3-haiku")
        );

        let args = Args::try_parse_from(["agora", "-p", "palm", "hi"]).unwrap();
        assert!(matches!(
            apply_overrides(&mut config, &args),
            Err(AgoraError::UnknownProvider(_))
        ));
    }
}
