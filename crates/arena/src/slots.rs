//! Agent slots compared in a round.
//!
//! The backend names every per-agent wire field after the slot it belongs to
//! (`agentA_final_report`, `passages_a`, `conversation_a`, ...). A [`SlotLayout`]
//! fixes how many slots a round has and [`SlotId`] derives every key from the
//! slot letter, so the streaming core never hard-codes a particular arena flavour.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ArenaError, ArenaResult};

const LETTERS: [char; 3] = ['A', 'B', 'C'];

pub const MIN_SLOTS: usize = 2;
pub const MAX_SLOTS: usize = LETTERS.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(u8);

impl SlotId {
    pub const A: SlotId = SlotId(0);
    pub const B: SlotId = SlotId(1);
    pub const C: SlotId = SlotId(2);

    /// Slot for a letter such as `a` or `B`
    pub fn from_letter(letter: char) -> Option<SlotId> {
        let upper = letter.to_ascii_uppercase();
        LETTERS
            .iter()
            .position(|l| *l == upper)
            .map(|i| SlotId(i as u8))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn letter(&self) -> char {
        LETTERS[self.index()]
    }

    /// Prefix of every per-agent stream field, e.g. `agentA`
    pub fn key_prefix(&self) -> String {
        format!("agent{}", self.letter())
    }

    /// Key of a per-agent stream field, e.g. `agentA_final_report`
    pub fn key(&self, field: &str) -> String {
        format!("agent{}_{}", self.letter(), field)
    }

    /// Lowercase key used by metadata and request bodies, e.g. `passages_a`
    pub fn lower_key(&self, field: &str) -> String {
        format!("{}_{}", field, self.letter().to_ascii_lowercase())
    }

    /// Key used by the persistence payload, e.g. `agent_a_response`
    pub fn record_key(&self, field: &str) -> String {
        format!("agent_{}_{}", self.letter().to_ascii_lowercase(), field)
    }

    pub fn display_name(&self) -> String {
        format!("Agent {}", self.letter())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent{}", self.letter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    count: usize,
}

impl SlotLayout {
    pub fn new(count: usize) -> ArenaResult<Self> {
        if !(MIN_SLOTS..=MAX_SLOTS).contains(&count) {
            return Err(ArenaError::InvalidSlotCount(count));
        }
        Ok(Self { count })
    }

    /// Two agents side by side
    pub fn pair() -> Self {
        Self { count: 2 }
    }

    /// Three agents side by side
    pub fn trio() -> Self {
        Self { count: 3 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn slots(&self) -> impl Iterator<Item = SlotId> {
        (0..self.count as u8).map(SlotId)
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        slot.index() < self.count
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self::pair()
    }
}
