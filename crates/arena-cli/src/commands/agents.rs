use anyhow::{Context, Result};
use arena::client::ArenaClient;
use console::style;

use crate::configuration::Settings;

pub async fn handle_agents(settings: &Settings) -> Result<()> {
    let client = ArenaClient::new(&settings.client_config()?, settings.auth_context()?)?;
    let roster = client
        .bootstrap()
        .await
        .context("Failed to fetch the agent roster")?;

    println!("{} {}", style("Session").bold(), style(&roster.session_id).dim());
    for (i, entry) in roster.agents.iter().enumerate() {
        println!(
            "  {} {} {}",
            style(format!("{}.", i + 1)).cyan(),
            entry.name.as_deref().unwrap_or("(hidden)"),
            style(&entry.id).dim()
        );
    }
    Ok(())
}
