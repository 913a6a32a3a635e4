use std::collections::BTreeMap;

use crate::models::message::ChatMessage;
use crate::slots::{SlotId, SlotLayout};
use crate::stream::snapshot::{AgentSnapshot, Snapshot};

/// Position of the assistant messages a round writes to, fixed when the round starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundHandle {
    index: usize,
}

impl RoundHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Every agent's side of the conversation.
///
/// Each round appends one user message and one empty assistant message to every
/// slot; stream snapshots then fill in the assistant message in place.
/// Histories only ever grow.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    layout: SlotLayout,
    histories: BTreeMap<SlotId, Vec<ChatMessage>>,
}

impl ConversationState {
    pub fn new(layout: SlotLayout) -> Self {
        ConversationState {
            layout,
            histories: layout.slots().map(|slot| (slot, Vec::new())).collect(),
        }
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn history(&self, slot: SlotId) -> &[ChatMessage] {
        self.histories.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copy of every history as it stands, to send with the next question
    pub fn histories(&self) -> BTreeMap<SlotId, Vec<ChatMessage>> {
        self.histories.clone()
    }

    pub fn rounds(&self) -> usize {
        self.history(SlotId::A).iter().filter(|m| m.is_user()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds() == 0
    }

    /// Append the question and a pending answer to every slot
    pub fn begin_round(&mut self, question: &str) -> RoundHandle {
        let mut index = 0;
        for history in self.histories.values_mut() {
            history.push(ChatMessage::user().with_text(question));
            history.push(ChatMessage::pending_assistant());
            index = history.len() - 1;
        }
        RoundHandle { index }
    }

    /// Write a stream snapshot into the round's assistant messages.
    ///
    /// Only agents the line changed are written, except on the final snapshot
    /// which syncs every agent. A failed round puts its message in every pane.
    pub fn apply_snapshot(&mut self, handle: RoundHandle, snapshot: &Snapshot) {
        if let Some(message) = &snapshot.message {
            for slot in self.layout.slots() {
                if let Some(assistant) = self.assistant_mut(slot, handle) {
                    assistant.set_text(message.as_str());
                    assistant.is_intermediate = Some(false);
                    assistant.is_complete = Some(true);
                }
            }
            return;
        }

        for agent in &snapshot.agents {
            if !(agent.updated || snapshot.is_final) {
                continue;
            }
            if let Some(assistant) = self.assistant_mut(agent.slot, handle) {
                write_agent(assistant, agent);
            }
        }
    }

    /// Handle of the most recent round, if any
    pub fn latest_round(&self) -> Option<RoundHandle> {
        let history = self.history(SlotId::A);
        match history.last() {
            Some(last) if !last.is_user() => Some(RoundHandle {
                index: history.len() - 1,
            }),
            _ => None,
        }
    }

    pub fn assistant(&self, slot: SlotId, handle: RoundHandle) -> Option<&ChatMessage> {
        self.histories.get(&slot)?.get(handle.index)
    }

    fn assistant_mut(&mut self, slot: SlotId, handle: RoundHandle) -> Option<&mut ChatMessage> {
        self.histories.get_mut(&slot)?.get_mut(handle.index)
    }
}

fn write_agent(assistant: &mut ChatMessage, agent: &AgentSnapshot) {
    assistant.set_text(agent.content.as_str());
    if !agent.intermediate.is_empty() || assistant.intermediate_steps.is_none() {
        assistant.intermediate_steps = Some(agent.intermediate.clone());
    }
    assistant.citations = Some(agent.citations.clone());
    assistant.is_intermediate = Some(agent.is_intermediate);
    assistant.is_complete = Some(agent.is_complete);
}
