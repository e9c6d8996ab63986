use super::commands::CommandHandler;
use std::sync::Arc;

/// Slash commands in registration order.
pub struct CommandRegistry {
    handlers: Vec<(String, Arc<dyn CommandHandler>)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register<C: CommandHandler + 'static>(&mut self, name: &str, command: C) {
        self.handlers.retain(|(existing, _)| existing != name);
        self.handlers.push((name.to_string(), Arc::new(command)));
    }

    /// Finds the command `input` invokes and returns it with its trimmed
    /// arguments. The name must be followed by whitespace or end of input,
    /// so `/agents` does not match `/agent`.
    pub fn find<'a>(&self, input: &'a str) -> Option<(Arc<dyn CommandHandler>, &'a str)> {
        let rest = input.trim().strip_prefix('/')?;
        self.handlers.iter().find_map(|(name, handler)| {
            let args = rest.strip_prefix(name.as_str())?;
            if args.is_empty() || args.starts_with(char::is_whitespace) {
                Some((Arc::clone(handler), args.trim()))
            } else {
                None
            }
        })
    }

    pub fn get_command_names(&self) -> Vec<String> {
        self.handlers.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn usages(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|(_, handler)| handler.help()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
