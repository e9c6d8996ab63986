use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Question to send. Piped stdin is added as context
    pub query: Option<String>,

    /// AI provider to use [possible values: gemini, openai, anthropic, cohere, huggingface]
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use (provider-specific)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Start an interactive chat session
    #[arg(short, long)]
    pub chat: bool,

    /// Image to attach to the first message (repeatable)
    #[arg(short, long = "image")]
    pub images: Vec<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_and_flags() {
        let args = Args::try_parse_from([
            "agora", "-p", "cohere", "-m", "command-light", "-i", "a.png", "-i", "b.png",
            "what is this?",
        ])
        .unwrap();
        assert_eq!(args.query.as_deref(), Some("what is this?"));
        assert_eq!(args.provider.as_deref(), Some("cohere"));
        assert_eq!(args.model.as_deref(), Some("command-light"));
        assert_eq!(args.images.len(), 2);
        assert!(!args.chat);
    }

    #[test]
    fn chat_mode_needs_no_query() {
        let args = Args::try_parse_from(["agora", "--chat", "-v"]).unwrap();
        assert!(args.chat);
        assert!(args.verbose);
        assert!(args.query.is_none());
    }
}
