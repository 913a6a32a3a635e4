use anyhow::Result;
use arena::citations::renumber;
use arena::conversation::{ConversationState, RoundHandle};
use arena::intermediate::preview;
use arena::models::message::ChatMessage;
use arena::slots::SlotId;
use arena::stream::Snapshot;
use bat::WrappingMode;
use console::style;

pub const NO_AGENT_PLACEHOLDER: &str = "_No agent is answering in this slot._";

/// Markdown body of one agent's pane
pub fn pane_text(message: Option<&ChatMessage>) -> String {
    let Some(message) = message else {
        return NO_AGENT_PLACEHOLDER.to_string();
    };

    let steps = message.intermediate_steps.as_deref().unwrap_or("");
    if message.text().is_empty() {
        return if steps.trim().is_empty() {
            "_Waiting for the agent..._".to_string()
        } else {
            format!("_Thinking..._\n\n{}", preview(steps))
        };
    }

    let citations = message.citations.as_deref().unwrap_or(&[]);
    let rendered = renumber(message.text(), citations);
    let mut body = rendered.text.clone();

    let visible = rendered.visible_citations(message.is_complete());
    if !visible.is_empty() {
        body.push_str("\n\n**Sources**\n");
        for (i, citation) in visible.iter().enumerate() {
            match &citation.text {
                Some(text) => body.push_str(&format!("\n[{}] {} ({})", i + 1, text, citation.url)),
                None => body.push_str(&format!("\n[{}] {}", i + 1, citation.url)),
            }
        }
    }
    body
}

/// One-line progress summary of the agents a snapshot changed
pub fn progress_line(snapshot: &Snapshot) -> Option<String> {
    let parts: Vec<String> = snapshot
        .agents
        .iter()
        .filter(|agent| agent.updated)
        .map(|agent| {
            let status = if agent.is_complete {
                "done".to_string()
            } else if !agent.content.is_empty() {
                format!("writing ({} chars)", agent.content.chars().count())
            } else {
                last_line(&preview(&agent.intermediate)).unwrap_or("thinking").to_string()
            };
            format!("{}: {}", agent.slot.display_name(), status)
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

/// Print every pane of a round, one after another
pub fn print_round(conversation: &ConversationState, handle: RoundHandle) -> Result<()> {
    for slot in conversation.layout().slots() {
        print_pane(slot, &pane_text(conversation.assistant(slot, handle)))?;
    }
    Ok(())
}

fn print_pane(slot: SlotId, body: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(body.as_bytes()).name(slot.display_name()))
        .language("Markdown")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow::anyhow!("Failed to render {}: {}", slot.display_name(), e))?;
    println!();
    Ok(())
}

pub fn print_error(message: &str) {
    println!("{}", style(message).red().bold());
}
