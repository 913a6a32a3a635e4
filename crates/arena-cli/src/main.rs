use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod configuration;
mod render;

use commands::agents::handle_agents;
use commands::ask::handle_ask;
use commands::chat::handle_chat;
use commands::probe::handle_probe;
use configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend base URL (can also be set via ARENA_SERVER__BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds (can also be set via ARENA_SERVER__TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Number of agents answering each question, 2 or 3 (can also be set via ARENA_SLOTS)
    #[arg(long, global = true)]
    slots: Option<usize>,

    /// Username for basic auth (can also be set via ARENA_AUTH__USERNAME)
    #[arg(long, global = true)]
    username: Option<String>,

    /// Password for basic auth (can also be set via ARENA_AUTH__PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask one question, optionally followed by more in the same conversation
    Ask {
        question: String,

        #[arg(long = "follow-up")]
        follow_ups: Vec<String>,
    },
    /// List the agents assigned to a fresh session
    Agents,
    /// Check whether the configured credentials are accepted
    Probe,
    /// Interactive multi-turn session
    Chat,
}

impl Cli {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(base_url) = &self.base_url {
            settings.server.base_url = base_url.clone();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            settings.server.timeout_secs = timeout_secs;
        }
        if let Some(slots) = self.slots {
            settings.slots = slots;
        }
        if let Some(username) = &self.username {
            settings.auth.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            settings.auth.password = Some(password.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::new().context("Failed to load configuration")?;
    cli.apply_overrides(&mut settings);

    match &cli.command {
        Command::Ask {
            question,
            follow_ups,
        } => handle_ask(&settings, question, follow_ups).await,
        Command::Agents => handle_agents(&settings).await,
        Command::Probe => handle_probe(&settings).await,
        Command::Chat => handle_chat(&settings).await,
    }
}
