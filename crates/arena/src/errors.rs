use thiserror::Error;

use crate::slots::SlotId;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Unable to connect to backend (status: {status})")]
    HttpStatus { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid header value for {0}")]
    InvalidHeader(String),

    #[error("Unsupported slot count {0}: an arena compares 2 or 3 agents")]
    InvalidSlotCount(usize),

    #[error("No agent is assigned to {0}")]
    UnassignedSlot(SlotId),

    #[error("A round is already in flight")]
    Busy,

    #[error("Backend error: {0}")]
    Backend(String),
}

impl ArenaError {
    /// The message shown in the answer panes when a round dies on this error
    pub fn pane_message(&self) -> String {
        format!("Error: {}", self)
    }
}

pub type ArenaResult<T> = Result<T, ArenaError>;
