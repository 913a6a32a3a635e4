use serde_json::Value;

use super::metadata::RoundMetadata;
use crate::models::citation::Citation;
use crate::slots::{SlotId, SlotLayout};

/// What one agent has produced so far in the current round
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub slot: SlotId,
    pub content: String,
    pub intermediate: String,
    pub citations: Vec<Citation>,
    pub passages: Vec<Value>,
    pub is_intermediate: bool,
    pub is_complete: bool,
    /// Whether the line behind this snapshot changed this agent
    pub updated: bool,
}

impl AgentSnapshot {
    pub fn blank(slot: SlotId) -> Self {
        AgentSnapshot {
            slot,
            content: String::new(),
            intermediate: String::new(),
            citations: Vec::new(),
            passages: Vec::new(),
            is_intermediate: false,
            is_complete: false,
            updated: false,
        }
    }
}

/// The full state of a round after one stream line, handed to the line callback
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub agents: Vec<AgentSnapshot>,
    pub metadata: RoundMetadata,
    pub is_final: bool,
    /// Set on the terminal snapshot of a failed round
    pub message: Option<String>,
}

impl Snapshot {
    /// Terminal snapshot for a round that died: every agent blank, the reason in `message`
    pub fn failure<S: Into<String>>(layout: SlotLayout, metadata: RoundMetadata, message: S) -> Self {
        Snapshot {
            agents: layout.slots().map(AgentSnapshot::blank).collect(),
            metadata,
            is_final: true,
            message: Some(message.into()),
        }
    }

    pub fn agent(&self, slot: SlotId) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|agent| agent.slot == slot)
    }

    pub fn is_error(&self) -> bool {
        self.message.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_blanks_every_slot() {
        let snapshot = Snapshot::failure(
            SlotLayout::trio(),
            RoundMetadata::default(),
            "Error: boom",
        );
        assert!(snapshot.is_final);
        assert!(snapshot.is_error());
        assert_eq!(snapshot.agents.len(), 3);
        assert!(snapshot.agents.iter().all(|a| a.content.is_empty() && !a.updated));
        assert_eq!(snapshot.agent(SlotId::C).map(|a| a.slot), Some(SlotId::C));
    }
}
