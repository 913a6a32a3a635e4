use serde_json::Value;

use super::snapshot::AgentSnapshot;
use super::update::AgentUpdate;
use crate::models::citation::Citation;
use crate::slots::SlotId;

/// Everything known about one agent's answer in the current round.
///
/// Each stream line is a sparse overwrite: a field the line carries replaces the
/// stored value wholesale, a field it omits leaves the stored value alone.
/// Text fields are full snapshots from the backend, never deltas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentAccumulator {
    content: String,
    intermediate: String,
    citations: Vec<Citation>,
    is_intermediate: bool,
    is_complete: bool,
}

impl AgentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one line's fields for this agent. Returns whether the line touched it.
    pub fn apply(&mut self, update: &AgentUpdate) -> bool {
        if let Some(content) = &update.content {
            self.content.clone_from(content);
        }
        if let Some(intermediate) = &update.intermediate {
            self.intermediate.clone_from(intermediate);
        }
        if let Some(citations) = &update.citations {
            self.citations.clone_from(citations);
        }
        if let Some(is_intermediate) = update.is_intermediate {
            self.is_intermediate = is_intermediate;
        }
        if let Some(is_complete) = update.is_complete {
            self.is_complete = is_complete;
        }
        update.touches()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn intermediate(&self) -> &str {
        &self.intermediate
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// Owned copy of the current state
    pub fn snapshot(&self, slot: SlotId, passages: &[Value], updated: bool) -> AgentSnapshot {
        AgentSnapshot {
            slot,
            content: self.content.clone(),
            intermediate: self.intermediate.clone(),
            citations: self.citations.clone(),
            passages: passages.to_vec(),
            is_intermediate: self.is_intermediate,
            is_complete: self.is_complete,
            updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: &str) -> AgentUpdate {
        AgentUpdate {
            content: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_absent_fields_are_preserved() {
        let mut acc = AgentAccumulator::new();
        acc.apply(&AgentUpdate {
            intermediate: Some("step 1".to_string()),
            citations: Some(vec![Citation::new("https://a.example")]),
            is_intermediate: Some(true),
            ..Default::default()
        });
        let before = acc.clone();

        acc.apply(&AgentUpdate::default());
        assert_eq!(acc, before);

        acc.apply(&content("Answer"));
        assert_eq!(acc.content(), "Answer");
        assert_eq!(acc.intermediate(), "step 1");
        assert_eq!(acc.citations().len(), 1);
    }

    #[test]
    fn test_text_is_replaced_not_appended() {
        let mut acc = AgentAccumulator::new();
        acc.apply(&content("Hel"));
        acc.apply(&content("Hello"));
        assert_eq!(acc.content(), "Hello");
    }

    #[test]
    fn test_empty_citation_list_clears() {
        let mut acc = AgentAccumulator::new();
        acc.apply(&AgentUpdate {
            citations: Some(vec![Citation::new("https://a.example")]),
            ..Default::default()
        });
        acc.apply(&AgentUpdate {
            citations: Some(vec![]),
            ..Default::default()
        });
        assert!(acc.citations().is_empty());
    }

    #[test]
    fn test_false_flags_are_applied() {
        let mut acc = AgentAccumulator::new();
        acc.apply(&AgentUpdate {
            is_intermediate: Some(true),
            is_complete: Some(true),
            ..Default::default()
        });
        acc.apply(&AgentUpdate {
            is_intermediate: Some(false),
            ..Default::default()
        });
        let snapshot = acc.snapshot(SlotId::A, &[], false);
        assert!(!snapshot.is_intermediate);
        assert!(snapshot.is_complete);
    }

    #[test]
    fn test_snapshot_does_not_alias_state() {
        let mut acc = AgentAccumulator::new();
        acc.apply(&AgentUpdate {
            citations: Some(vec![Citation::new("https://a.example")]),
            ..Default::default()
        });
        let mut snapshot = acc.snapshot(SlotId::B, &[], true);
        snapshot.citations.clear();
        assert_eq!(acc.citations().len(), 1);
        assert!(acc.apply(&content("x")));
        assert!(!acc.apply(&AgentUpdate::default()));
    }
}
