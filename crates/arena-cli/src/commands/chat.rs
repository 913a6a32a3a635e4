use anyhow::{anyhow, Context, Result};
use arena::arena::Arena;
use arena::client::{Choice, VoteDirection};
use arena::intermediate::split_steps;
use arena::slots::{SlotId, SlotLayout};
use cliclack::{input, select};
use console::style;
use std::str::FromStr;
use strum::IntoEnumIterator;

use super::ask::{run_round, start_arena};
use crate::configuration::Settings;
use crate::render::print_error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Exit,
    Question(String),
    /// `/vote <slot> <up|down> <text>` on a span of the last answer
    SpanVote {
        slot: SlotId,
        vote: VoteDirection,
        text: String,
    },
    /// `/step <slot> <up|down> <n>` on the n-th intermediate step of the last answer
    StepVote {
        slot: SlotId,
        vote: VoteDirection,
        step: usize,
    },
}

pub fn parse_input(line: &str, layout: SlotLayout) -> Result<ChatInput> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") {
        return Ok(ChatInput::Exit);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ChatInput::Question(line.to_string()));
    };

    let mut parts = command.splitn(4, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let slot = parts
        .next()
        .filter(|s| s.chars().count() == 1)
        .and_then(|s| s.chars().next())
        .and_then(SlotId::from_letter)
        .filter(|slot| layout.contains(*slot))
        .ok_or_else(|| anyhow!("Expected an agent letter"))?;
    let vote = parts
        .next()
        .and_then(|v| VoteDirection::from_str(&v.to_lowercase()).ok())
        .ok_or_else(|| anyhow!("Expected up or down"))?;
    let rest = parts.next().unwrap_or_default().trim();

    match name {
        "vote" if !rest.is_empty() => Ok(ChatInput::SpanVote {
            slot,
            vote,
            text: rest.to_string(),
        }),
        "step" => {
            let step = rest
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow!("Expected a step number"))?;
            Ok(ChatInput::StepVote { slot, vote, step })
        }
        "vote" => Err(anyhow!("Expected the text to vote on")),
        other => Err(anyhow!("Unknown command /{}", other)),
    }
}

pub async fn handle_chat(settings: &Settings) -> Result<()> {
    let mut arena = start_arena(settings).await?;

    println!(
        "Deep research arena {}",
        style("- type \"exit\" to end the session, /vote or /step to rate an answer").dim()
    );
    println!();

    loop {
        let line: String = input("Question:").placeholder("").interact()?;
        let parsed = match parse_input(&line, arena.layout()) {
            Ok(parsed) => parsed,
            Err(e) => {
                print_error(&e.to_string());
                continue;
            }
        };

        match parsed {
            ChatInput::Exit => break,
            ChatInput::Question(question) if question.is_empty() => continue,
            ChatInput::Question(question) => {
                if let Err(e) = run_round(&mut arena, &question).await {
                    print_error(&format!("{:#}", e));
                }
            }
            ChatInput::SpanVote { slot, vote, text } => {
                report_vote(arena.vote_span(slot, vote, &text).await);
            }
            ChatInput::StepVote { slot, vote, step } => match step_text(&arena, slot, step) {
                Some(text) => report_vote(arena.vote_step(slot, vote, &text).await),
                None => print_error(&format!("{} has no step {}", slot.display_name(), step)),
            },
        }
    }

    if arena.layout() == SlotLayout::pair() && !arena.conversation().is_empty() {
        choose(&arena).await?;
    }
    Ok(())
}

fn step_text(arena: &Arena, slot: SlotId, step: usize) -> Option<String> {
    let conversation = arena.conversation();
    let message = conversation.assistant(slot, conversation.latest_round()?)?;
    split_steps(message.intermediate_steps.as_deref()?)
        .get(step - 1)
        .map(|s| s.to_string())
}

fn report_vote(result: arena::errors::ArenaResult<()>) {
    match result {
        Ok(()) => println!("{}", style("Vote recorded").green()),
        Err(e) => {
            tracing::warn!("Vote failed: {}", e);
            print_error(&format!("Vote failed: {}", e));
        }
    }
}

async fn choose(arena: &Arena) -> Result<()> {
    let mut prompt = select("Which answer was better?");
    for choice in Choice::iter() {
        prompt = prompt.item(choice, choice.label(), "");
    }
    let choice = prompt.interact()?;

    let reveal = arena
        .choose(choice)
        .await
        .context("Failed to record your choice")?;

    let name = |agent: Option<arena::client::RevealedAgent>| {
        agent.map(|a| a.name).unwrap_or_else(|| "unknown".to_string())
    };
    println!("Agent A was {}", style(name(reveal.agent_a)).bold());
    println!("Agent B was {}", style(name(reveal.agent_b)).bold());
    Ok(())
}
