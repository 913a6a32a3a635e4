use anyhow::{Context, Result};
use arena::client::ArenaClient;
use console::style;

use crate::configuration::Settings;

pub async fn handle_probe(settings: &Settings) -> Result<()> {
    let client = ArenaClient::new(&settings.client_config()?, settings.auth_context()?)?;
    let valid = client
        .probe_credentials()
        .await
        .with_context(|| format!("Failed to reach {}", client.base_url()))?;

    if valid {
        println!("{}", style("Credentials accepted").green());
    } else {
        println!("{}", style("Credentials rejected").red());
    }
    Ok(())
}
