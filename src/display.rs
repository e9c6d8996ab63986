use agora::config::Provider;
use agora::providers::ModelEntry;
use agora::core::error::AgoraError;
use console::style;
use termimad::MadSkin;

fn terminal_width() -> usize {
    console::Term::stdout().size().1 as usize
}

/// Splits `line` into chunks of at most `max` characters, preferring to break on spaces.
fn wrap_line(line: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut lines = Vec::new();
    let mut remaining: Vec<char> = line.chars().collect();

    while remaining.len() > max {
        let split = remaining[..=max]
            .iter()
            .rposition(|c| *c == ' ')
            .filter(|pos| *pos > 0)
            .unwrap_or(max);
        lines.push(remaining[..split].iter().collect());
        let rest: String = remaining[split..].iter().collect();
        remaining = rest.trim_start().chars().collect();
    }
    if !remaining.is_empty() || lines.is_empty() {
        lines.push(remaining.into_iter().collect());
    }
    lines
}

/// Display an assistant reply in a box, labelled with the provider that wrote it
pub fn display_response(response: &str, provider: Option<Provider>) {
    let max_width = std::cmp::min(terminal_width().saturating_sub(4), 120).max(60);
    let max_line_len = max_width.saturating_sub(4);

    let wrapped_lines: Vec<String> = response
        .lines()
        .flat_map(|line| wrap_line(line, max_line_len))
        .collect();

    let content_max_len = wrapped_lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    let box_width = std::cmp::min(max_width, content_max_len + 4).max(20);

    let top_border = "┌".to_string() + &"─".repeat(box_width - 2) + "┐";
    let bottom_border = "└".to_string() + &"─".repeat(box_width - 2) + "┘";

    let title = match provider {
        Some(provider) => format!("🤖 {}", provider.display_name().to_uppercase()),
        None => "🤖 AI RESPONSE".to_string(),
    };
    println!("\n{}", style(title).bold().blue());
    println!("{}", style(&top_border).dim().blue());

    for line in wrapped_lines {
        let padding = box_width.saturating_sub(line.chars().count() + 3);
        println!("│ {}{}│", style(&line).bold().white(), " ".repeat(padding));
    }

    println!("{}", style(&bottom_border).dim().blue());
}

/// Render markdown replies with termimad
pub fn display_markdown(response: &str) {
    let skin = MadSkin::default();
    println!();
    skin.print_text(response);
}

pub fn looks_like_markdown(response: &str) -> bool {
    response.contains("```")
        || response.contains('*')
        || response.contains('`')
        || response.contains('#')
}

/// Command engine output (agent switches, listings, usage)
pub fn display_notice(message: &str) {
    println!("{}", style(message).cyan());
}

/// Shown above a reply when an agent was picked from keywords
pub fn display_advisory(message: &str) {
    println!("{}", style(message).dim().italic());
}

pub fn display_error(error: &AgoraError) {
    let hint = match error {
        AgoraError::MissingCredential(provider) => Some(format!(
            "Set {} or add an api_key for {} to the config file",
            provider.api_key_env(),
            provider
        )),
        AgoraError::NoActiveService => {
            Some("No provider has a credential. Set one of the *_API_KEY variables".to_string())
        }
        AgoraError::RateLimited {
            retry_after: Some(secs),
            ..
        }
        | AgoraError::TransientUnavailable {
            retry_after: Some(secs),
            ..
        } => Some(format!("Try again in about {} seconds", secs)),
        _ => None,
    };

    eprintln!("{} {}", style("❌").bold().red(), style(error).bold().red());
    if let Some(hint) = hint {
        eprintln!("   {}", style(hint).dim());
    }
}

/// One line per configured provider, marking the one in use
pub fn display_providers(active: &[Provider], current: Option<Provider>) {
    if active.is_empty() {
        println!("{}", style("No providers configured.").yellow());
        return;
    }
    println!("{}", style("Configured providers").bold().underlined());
    for provider in active {
        let marker = if Some(*provider) == current { "●" } else { "○" };
        println!(
            "{} {} ({})",
            style(marker).green(),
            provider.display_name(),
            provider
        );
    }
}

pub fn display_models(provider: Provider, models: &[ModelEntry], current: &str) {
    println!(
        "{}",
        style(format!("{} models", provider.display_name()))
            .bold()
            .underlined()
    );
    for model in models {
        let marker = if model.id == current { "●" } else { "○" };
        let mut line = format!("{} {}", style(marker).green(), model.id);
        if model.name != model.id {
            line.push_str(&format!(" - {}", model.name));
        }
        if let Some(tag) = &model.tag {
            line.push_str(&format!(" {}", style(format!("[{}]", tag)).dim()));
        }
        println!("{}", line);
    }
}
