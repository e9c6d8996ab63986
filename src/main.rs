use agora::agents::{AgentService, FileStore};
use agora::config::Config;
use agora::core::error::AgoraError;
use agora::manager::AIManager;
use agora::providers::factory::ProviderFactory;
use agora::providers::transport::ReqwestTransport;
use agora::session::ChatSession;
use clap::Parser;
use std::sync::Arc;

mod app;
mod cli;
mod display;
mod input;

use crate::app::Application;
use crate::cli::Args;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "agora=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("AGORA_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<(), AgoraError> {
    let mut config = Config::load()?;
    app::apply_overrides(&mut config, &args)?;

    let transport = Arc::new(ReqwestTransport::new()?);
    let manager = AIManager::from_config(&config, ProviderFactory::new(transport));
    let agents = AgentService::new(Box::new(FileStore::open(Config::state_path())));
    let system_prompt = config
        .system_prompt
        .clone()
        .filter(|prompt| !prompt.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let session = ChatSession::new(manager, agents, system_prompt);
    Application::new(args, session).run().await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        display::display_error(&e);
        std::process::exit(1);
    }
}
