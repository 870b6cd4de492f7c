//! Error types for the receiving side.

use thiserror::Error;

/// Errors reported by a [`crate::Transport`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is down.
    #[error("transport disconnected")]
    Disconnected,

    /// The transport refused the subscription (e.g. private channel auth).
    #[error("subscription refused: {0}")]
    Refused(String),
}

/// Errors from session lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The transport provider went away before a transport was supplied.
    #[error("transport was never provided")]
    TransportDropped,

    /// Opening a channel failed.
    #[error("failed to subscribe to {channel}: {source}")]
    Subscribe {
        channel: String,
        #[source]
        source: TransportError,
    },

    /// The channel is not subscribed in this session.
    #[error("channel {0} is not subscribed")]
    NotSubscribed(String),
}

/// A handler failed to process a message. Logged, never propagated to the
/// transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The payload did not have the shape the event name promises.
    #[error("malformed {event_name} payload: {reason}")]
    MalformedPayload { event_name: String, reason: String },

    /// Any other handler failure.
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}
