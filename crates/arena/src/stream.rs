//! Streaming core: turns the backend's newline-delimited JSON answer stream
//! into a sequence of consistent per-round snapshots.
//!
//! [`decoder::ChunkDecoder`] frames raw bytes into JSON objects,
//! [`update::StreamUpdate`] types each object against the slot layout,
//! [`accumulator::AgentAccumulator`] holds one agent's state and
//! [`session::StreamingSession`] drives a round end to end.
pub mod accumulator;
pub mod decoder;
pub mod metadata;
pub mod session;
pub mod snapshot;
pub mod update;

pub use session::{
    FinalizedRound, RoundAssembler, RoundOutcome, RoundPersistence, RoundPhase, RoundReport,
    StreamingSession,
};
pub use snapshot::{AgentSnapshot, Snapshot};
