use agora::config::Config;
use agora::core::error::AgoraError;

use console::style;
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Context, EditMode, Editor, Helper};

/// Slash commands complete from the known names; anything else completes as a path
pub struct ChatCompleter {
    filename_completer: FilenameCompleter,
    commands: Vec<String>,
}

impl ChatCompleter {
    pub fn new(commands: Vec<String>) -> Self {
        Self {
            filename_completer: FilenameCompleter::new(),
            commands,
        }
    }

    fn command_matches(&self, prefix: &str) -> Vec<Pair> {
        self.commands
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Pair {
                display: format!("/{}", cmd),
                replacement: cmd.to_string(),
            })
            .collect()
    }
}

impl Completer for ChatCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        if let Some(command_part) = line[..pos].strip_prefix('/') {
            if !command_part.contains(char::is_whitespace) {
                let matches = self.command_matches(command_part);
                if !matches.is_empty() {
                    return Ok((1, matches));
                }
            }
        }

        self.filename_completer.complete(line, pos, ctx)
    }
}

pub struct ChatHelper {
    completer: ChatCompleter,
    hinter: HistoryHinter,
}

impl ChatHelper {
    pub fn new(commands: Vec<String>) -> Self {
        Self {
            completer: ChatCompleter::new(commands),
            hinter: HistoryHinter {},
        }
    }
}

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        self.completer.complete(line, pos, ctx)
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {}

impl Validator for ChatHelper {}

pub type ChatEditor = Editor<ChatHelper, FileHistory>;

/// Creates a line editor that completes `commands` and remembers past input
pub fn create_editor(commands: Vec<String>) -> Result<ChatEditor, AgoraError> {
    let config = rustyline::Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut editor = Editor::with_config(config)
        .map_err(|e| AgoraError::Input(format!("Failed to create line editor: {}", e)))?;
    editor.set_helper(Some(ChatHelper::new(commands)));

    if let Err(e) = editor.load_history(&Config::input_history_path()) {
        tracing::debug!("No input history loaded: {}", e);
    }

    Ok(editor)
}

/// Reads a line; `None` on Ctrl-C or Ctrl-D
pub fn read_input(editor: &mut ChatEditor) -> Result<Option<String>, AgoraError> {
    let prompt = if cfg!(windows) && std::env::var("PSModulePath").is_ok() {
        "> ".to_string()
    } else {
        style("> ").bold().cyan().to_string()
    };
    match editor.readline(&prompt) {
        Ok(line) => {
            if !line.trim().is_empty() {
                editor
                    .add_history_entry(&line)
                    .map_err(|e| AgoraError::Input(format!("Failed to add history entry: {}", e)))?;
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
            println!("Exiting...");
            Ok(None)
        }
        Err(err) => Err(AgoraError::Input(format!("Input error: {}", err))),
    }
}

pub fn save_history(editor: &mut ChatEditor) -> Result<(), AgoraError> {
    let history_path = Config::input_history_path();

    if let Some(parent) = history_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    editor
        .save_history(&history_path)
        .map_err(|e| AgoraError::Input(format!("Failed to save history: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_command_names() {
        let completer = ChatCompleter::new(vec![
            "agent".to_string(),
            "clear".to_string(),
            "create".to_string(),
        ]);
        let matches = completer.command_matches("c");
        let names: Vec<&str> = matches.iter().map(|p| p.replacement.as_str()).collect();
        assert_eq!(names, vec!["clear", "create"]);
        assert_eq!(matches[0].display, "/clear");
    }
}
