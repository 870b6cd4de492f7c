//! Error types for publishing.

use notecast_events::EventError;
use thiserror::Error;

/// Errors reported by a [`crate::Broadcaster`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The transport could not be reached or is failing.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The transport answered but refused the message.
    #[error("transport rejected message (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Errors surfaced to callers of [`crate::Publisher::publish`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// A note-created event had no author; supply one and publish again.
    #[error("note {note_id} cannot be published without an author")]
    MissingAuthor { note_id: i64 },

    /// The transport is unreachable. Not retried here.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The transport refused the message.
    #[error("transport rejected message (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Any other envelope construction failure.
    #[error("envelope error: {0}")]
    Envelope(EventError),
}

impl PublishError {
    /// Whether trying the same publish later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::TransportUnavailable(_))
    }
}

impl From<EventError> for PublishError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::MissingAuthor { note_id } => PublishError::MissingAuthor { note_id },
            other => PublishError::Envelope(other),
        }
    }
}

impl From<BroadcastError> for PublishError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::Unavailable(msg) => PublishError::TransportUnavailable(msg),
            BroadcastError::Rejected { status, message } => {
                PublishError::Rejected { status, message }
            }
        }
    }
}
