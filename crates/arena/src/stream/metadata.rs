use serde_json::Value;
use std::collections::BTreeMap;

use super::decoder::JsonObject;
use crate::slots::{SlotId, SlotLayout};

/// Per-slot fields the backend reports in a `metadata` object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFields {
    pub passages: BTreeMap<SlotId, Vec<Value>>,
    pub agent_types: BTreeMap<SlotId, String>,
    pub agent_ids: BTreeMap<SlotId, String>,
    pub selected_agents: Option<Value>,
}

impl MetadataFields {
    fn from_object(object: &JsonObject) -> Self {
        let mut fields = MetadataFields::default();
        for slot in SlotLayout::trio().slots() {
            if let Some(passages) = object.get(&slot.lower_key("passages")).and_then(Value::as_array) {
                fields.passages.insert(slot, passages.clone());
            }
            if let Some(kind) = object.get(&slot.key("type")).and_then(Value::as_str) {
                fields.agent_types.insert(slot, kind.to_string());
            }
            if let Some(id) = object.get(&slot.key("id")).and_then(Value::as_str) {
                fields.agent_ids.insert(slot, id.to_string());
            }
        }
        fields.selected_agents = object
            .get("selected_agents")
            .filter(|v| !v.is_null())
            .cloned();
        fields
    }

    fn is_empty(&self) -> bool {
        self.passages.is_empty()
            && self.agent_types.is_empty()
            && self.agent_ids.is_empty()
            && self.selected_agents.is_none()
    }

    fn mentions(&self, slot: SlotId) -> bool {
        self.passages.contains_key(&slot)
            || self.agent_types.contains_key(&slot)
            || self.agent_ids.contains_key(&slot)
    }
}

/// The `metadata` object of a stream line, classified when it is parsed
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMetadata {
    /// Two-agent arena: selected agent ids and per-agent passages
    Pair(MetadataFields),
    /// Three-agent arena, which also reports the full roster
    Trio {
        fields: MetadataFields,
        all_agents: Option<Value>,
    },
    /// A metadata object with none of the known keys
    Other(JsonObject),
}

impl StreamMetadata {
    pub fn from_object(object: &JsonObject) -> Self {
        let fields = MetadataFields::from_object(object);
        let all_agents = object.get("all_agents").filter(|v| !v.is_null()).cloned();

        if all_agents.is_some() || fields.mentions(SlotId::C) {
            StreamMetadata::Trio { fields, all_agents }
        } else if !fields.is_empty() {
            StreamMetadata::Pair(fields)
        } else {
            StreamMetadata::Other(object.clone())
        }
    }
}

/// Metadata merged over every line of a round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundMetadata {
    pub fields: MetadataFields,
    pub all_agents: Option<Value>,
    pub extra: JsonObject,
}

impl RoundMetadata {
    /// Overwrite every field the incoming metadata carries, keep the rest
    pub fn merge(&mut self, incoming: &StreamMetadata) {
        match incoming {
            StreamMetadata::Pair(fields) => self.merge_fields(fields),
            StreamMetadata::Trio { fields, all_agents } => {
                self.merge_fields(fields);
                if let Some(all_agents) = all_agents {
                    self.all_agents = Some(all_agents.clone());
                }
            }
            StreamMetadata::Other(object) => {
                for (key, value) in object {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    fn merge_fields(&mut self, fields: &MetadataFields) {
        self.fields
            .passages
            .extend(fields.passages.iter().map(|(k, v)| (*k, v.clone())));
        self.fields
            .agent_types
            .extend(fields.agent_types.iter().map(|(k, v)| (*k, v.clone())));
        self.fields
            .agent_ids
            .extend(fields.agent_ids.iter().map(|(k, v)| (*k, v.clone())));
        if let Some(selected) = &fields.selected_agents {
            self.fields.selected_agents = Some(selected.clone());
        }
    }

    pub fn passages(&self, slot: SlotId) -> &[Value] {
        self.fields
            .passages
            .get(&slot)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn agent_type(&self, slot: SlotId) -> Option<&str> {
        self.fields.agent_types.get(&slot).map(String::as_str)
    }

    pub fn agent_id(&self, slot: SlotId) -> Option<&str> {
        self.fields.agent_ids.get(&slot).map(String::as_str)
    }

    /// Drop anything reported for slots the layout does not have
    pub fn restrict_to(&mut self, layout: SlotLayout) {
        self.fields.passages.retain(|slot, _| layout.contains(*slot));
        self.fields.agent_types.retain(|slot, _| layout.contains(*slot));
        self.fields.agent_ids.retain(|slot, _| layout.contains(*slot));
    }
}
