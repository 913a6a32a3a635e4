use anyhow::{Context, Result};
use arena::arena::Arena;
use arena::stream::RoundOutcome;
use cliclack::spinner;
use tokio_util::sync::CancellationToken;

use crate::configuration::Settings;
use crate::render::{print_error, print_round, progress_line};

pub async fn start_arena(settings: &Settings) -> Result<Arena> {
    Arena::start(&settings.client_config()?, settings.auth_context()?)
        .await
        .context("Failed to start an arena session")
}

pub async fn handle_ask(settings: &Settings, question: &str, follow_ups: &[String]) -> Result<()> {
    let mut arena = start_arena(settings).await?;

    for question in std::iter::once(question).chain(follow_ups.iter().map(String::as_str)) {
        let outcome = run_round(&mut arena, question).await?;
        if outcome != RoundOutcome::Finalized {
            break;
        }
    }
    Ok(())
}

/// Ask one question, show live progress, then print every pane
pub async fn run_round(arena: &mut Arena, question: &str) -> Result<RoundOutcome> {
    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let spin = spinner();
    spin.start("waiting for the agents");

    let result = arena
        .ask(question, cancel, |snapshot, _| {
            if let Some(line) = progress_line(snapshot) {
                spin.set_message(line);
            }
        })
        .await;
    ctrl_c.abort();

    let outcome = match result {
        Ok(report) => {
            spin.stop(format!("{} updates received", report.delivered));
            report.outcome
        }
        Err(e) => {
            spin.stop("round failed");
            tracing::error!("Round failed: {}", e);
            if let Some(handle) = arena.conversation().latest_round() {
                print_round(arena.conversation(), handle)?;
            }
            return Err(e).context("The round did not complete");
        }
    };

    if let Some(handle) = arena.conversation().latest_round() {
        print_round(arena.conversation(), handle)?;
    }

    match &outcome {
        RoundOutcome::Finalized => {}
        RoundOutcome::BackendError(message) => print_error(&format!("Backend error: {}", message)),
        RoundOutcome::Cancelled => print_error("Round cancelled"),
        RoundOutcome::Incomplete => print_error("The backend closed the stream before finishing"),
    }
    Ok(outcome)
}
