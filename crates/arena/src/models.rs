//! These models represent the objects shared between the stream core, the
//! conversation history and the backend client.
//!
//! Chat messages are sent back to the backend verbatim as conversation history,
//! so their serialized shape follows the backend's snake_case wire format.
pub mod citation;
pub mod message;
