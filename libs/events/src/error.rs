//! Error types for envelope construction and payload decoding.

use thiserror::Error;

/// Errors that can occur when building or decoding events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A note-created event was raised without a resolved author.
    #[error("note {note_id} has no author snapshot")]
    MissingAuthor { note_id: i64 },

    /// The event payload is invalid.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
