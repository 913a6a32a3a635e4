use serde_json::Value;
use std::collections::BTreeMap;

use super::decoder::JsonObject;
use super::metadata::StreamMetadata;
use crate::models::citation::Citation;
use crate::slots::{SlotId, SlotLayout};

const MARKDOWN_FENCE_OPEN: &str = "```markdown\n";
const MARKDOWN_FENCE_CLOSE: &str = "\n```";

/// Fields one stream line carries for a single agent. `None` means the line
/// did not mention the field and the accumulated value must be kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentUpdate {
    pub intermediate: Option<String>,
    pub content: Option<String>,
    pub citations: Option<Vec<Citation>>,
    pub updated: Option<bool>,
    pub is_intermediate: Option<bool>,
    pub is_complete: Option<bool>,
}

impl AgentUpdate {
    /// Whether the line carried any field for this agent
    pub fn touches(&self) -> bool {
        self.intermediate.is_some()
            || self.content.is_some()
            || self.citations.is_some()
            || self.updated.is_some()
            || self.is_intermediate.is_some()
            || self.is_complete.is_some()
    }
}

/// One decoded stream line, typed against the slots of the current round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamUpdate {
    pub agents: BTreeMap<SlotId, AgentUpdate>,
    pub is_final: bool,
    pub heartbeat: bool,
    pub timestamp: Option<f64>,
    pub error: Option<String>,
    pub metadata: Option<StreamMetadata>,
}

impl StreamUpdate {
    /// Read every field this layout knows about out of a wire object.
    ///
    /// Unknown keys and keys for slots outside the layout are ignored, as are
    /// values of the wrong JSON type.
    pub fn from_object(object: &JsonObject, layout: SlotLayout) -> Self {
        let agents = layout
            .slots()
            .map(|slot| (slot, agent_update(object, slot)))
            .collect();

        let is_final = flag(object, "final").unwrap_or(false)
            || flag(object, "is_final").unwrap_or(false);

        StreamUpdate {
            agents,
            is_final,
            heartbeat: flag(object, "heartbeat").unwrap_or(false),
            timestamp: present(object, "timestamp").and_then(Value::as_f64),
            error: error_message(object),
            metadata: present(object, "metadata")
                .and_then(Value::as_object)
                .map(StreamMetadata::from_object),
        }
    }

    pub fn agent(&self, slot: SlotId) -> Option<&AgentUpdate> {
        self.agents.get(&slot)
    }
}

fn agent_update(object: &JsonObject, slot: SlotId) -> AgentUpdate {
    let field = |name: &str| present(object, &slot.key(name));
    let field_or = |name: &str, alias: &str| field(name).or_else(|| field(alias));

    AgentUpdate {
        intermediate: field("intermediate_steps")
            .and_then(Value::as_str)
            .map(str::to_string),
        content: field("final_report")
            .and_then(Value::as_str)
            .map(strip_markdown_fence),
        citations: field("citations").and_then(citations),
        updated: field("updated").and_then(Value::as_bool),
        is_intermediate: field_or("is_intermediate", "isIntermediate").and_then(Value::as_bool),
        is_complete: field_or("is_complete", "complete").and_then(Value::as_bool),
    }
}

/// A key whose value is JSON `null` counts as absent
fn present<'a>(object: &'a JsonObject, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|value| !value.is_null())
}

fn flag(object: &JsonObject, key: &str) -> Option<bool> {
    present(object, key).and_then(Value::as_bool)
}

fn error_message(object: &JsonObject) -> Option<String> {
    match present(object, "error")? {
        Value::String(message) if message.is_empty() => None,
        Value::String(message) => Some(message.clone()),
        Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

fn citations(value: &Value) -> Option<Vec<Citation>> {
    let entries = value.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(|entry| match serde_json::from_value::<Citation>(entry.clone()) {
                Ok(citation) => Some(citation),
                Err(e) => {
                    tracing::warn!("Skipping malformed citation entry {}: {}", entry, e);
                    None
                }
            })
            .collect(),
    )
}

/// Final reports sometimes arrive wrapped in a markdown code fence
pub fn strip_markdown_fence(report: &str) -> String {
    let body = report.strip_prefix(MARKDOWN_FENCE_OPEN).unwrap_or(report);
    let body = body.strip_suffix(MARKDOWN_FENCE_CLOSE).unwrap_or(body);
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value, layout: SlotLayout) -> StreamUpdate {
        StreamUpdate::from_object(value.as_object().unwrap(), layout)
    }

    #[test]
    fn test_parse_agent_fields() {
        let update = parse(
            json!({
                "agentA_intermediate_steps": "searching",
                "agentA_final_report": "```markdown\n# Answer\n```",
                "agentA_citations": ["https://a.example"],
                "agentA_updated": true,
                "agentA_is_intermediate": false,
                "agentB_is_complete": true
            }),
            SlotLayout::pair(),
        );

        let a = update.agent(SlotId::A).unwrap();
        assert_eq!(a.intermediate.as_deref(), Some("searching"));
        assert_eq!(a.content.as_deref(), Some("# Answer"));
        assert_eq!(a.citations, Some(vec![Citation::new("https://a.example")]));
        assert_eq!(a.updated, Some(true));
        assert_eq!(a.is_intermediate, Some(false));
        assert_eq!(a.is_complete, None);

        let b = update.agent(SlotId::B).unwrap();
        assert_eq!(b.is_complete, Some(true));
        assert!(b.content.is_none());
        assert!(!update.is_final);
    }

    #[test]
    fn test_null_counts_as_absent() {
        let update = parse(
            json!({"agentA_final_report": null, "agentA_citations": null, "final": null}),
            SlotLayout::pair(),
        );
        assert!(!update.agent(SlotId::A).unwrap().touches());
        assert!(!update.is_final);
    }

    #[test]
    fn test_empty_citation_list_is_present() {
        let update = parse(json!({"agentB_citations": []}), SlotLayout::pair());
        assert_eq!(update.agent(SlotId::B).unwrap().citations, Some(vec![]));
    }

    #[test]
    fn test_model_pair_aliases() {
        let update = parse(
            json!({"agentA_isIntermediate": true, "agentB_complete": true}),
            SlotLayout::pair(),
        );
        assert_eq!(update.agent(SlotId::A).unwrap().is_intermediate, Some(true));
        assert_eq!(update.agent(SlotId::B).unwrap().is_complete, Some(true));
    }

    #[test]
    fn test_final_flag_spellings() {
        assert!(parse(json!({"final": true}), SlotLayout::pair()).is_final);
        assert!(parse(json!({"is_final": true}), SlotLayout::pair()).is_final);
        assert!(!parse(json!({"is_final": false}), SlotLayout::pair()).is_final);
    }

    #[test]
    fn test_slots_outside_layout_are_ignored() {
        let update = parse(json!({"agentC_final_report": "third"}), SlotLayout::pair());
        assert!(update.agent(SlotId::C).is_none());

        let update = parse(json!({"agentC_final_report": "third"}), SlotLayout::trio());
        assert_eq!(
            update.agent(SlotId::C).unwrap().content.as_deref(),
            Some("third")
        );
    }

    #[test]
    fn test_heartbeat_and_error() {
        let heartbeat = parse(
            json!({"heartbeat": true, "timestamp": 1718000000.5}),
            SlotLayout::pair(),
        );
        assert!(heartbeat.heartbeat);
        assert_eq!(heartbeat.timestamp, Some(1718000000.5));

        let error = parse(json!({"error": "boom"}), SlotLayout::pair());
        assert_eq!(error.error.as_deref(), Some("boom"));

        let detail = parse(json!({"error": {"code": 7}}), SlotLayout::pair());
        assert_eq!(detail.error.as_deref(), Some(r#"{"code":7}"#));
    }

    #[test]
    fn test_strip_markdown_fence() {
        assert_eq!(strip_markdown_fence("```markdown\nbody\n```"), "body");
        assert_eq!(strip_markdown_fence("```markdown\nstill open"), "still open");
        assert_eq!(strip_markdown_fence("plain"), "plain");
        assert_eq!(strip_markdown_fence("```python\nx\n```"), "```python\nx");
    }
}
