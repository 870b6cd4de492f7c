//! Domain event definitions and payload shapes.
//!
//! Each event name has a payload struct describing exactly what goes on the
//! wire. Renaming a Rust type here must never change an event name.

use chrono::{DateTime, Utc};
use notecast_id::Identity;
use serde::{Deserialize, Serialize};

// =============================================================================
// Event Name Constants
// =============================================================================

/// All event names as constants.
pub mod event_names {
    pub const NOTE_CREATED: &str = "note.created";
    pub const NOTIFICATION_SENT: &str = "notification.sent";

    /// Every event name a publisher may emit.
    pub const ALL: &[&str] = &[NOTE_CREATED, NOTIFICATION_SENT];
}

// =============================================================================
// Severity
// =============================================================================

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Lenient decoding for received payloads: anything unrecognised is `info`.
    pub fn from_wire(s: Option<&str>) -> Self {
        s.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "success" => Ok(Severity::Success),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(crate::EventError::InvalidPayload(format!(
                "unknown severity '{other}'"
            ))),
        }
    }
}

// =============================================================================
// Record Snapshots
// =============================================================================

/// Immutable snapshot of a created note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSnapshot {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Immutable snapshot of a note's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub id: i64,
    pub name: String,
    pub email: String,
}

// =============================================================================
// Domain Events
// =============================================================================

/// An event raised by the domain layer, ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A note was created.
    NoteCreated {
        note: NoteSnapshot,
        /// Must be resolved before publishing.
        author: Option<AuthorSnapshot>,
        /// Identities that additionally get the event on their private
        /// `user.<identity>` channel. Empty unless a caller opts in.
        also_notify: Vec<Identity>,
    },

    /// A free-form notification, private when `target` is set.
    NotificationSent {
        message: String,
        severity: Severity,
        target: Option<Identity>,
    },
}

impl DomainEvent {
    /// Creates a note-created event broadcast on the public notes channel.
    pub fn note_created(note: NoteSnapshot, author: Option<AuthorSnapshot>) -> Self {
        DomainEvent::NoteCreated {
            note,
            author,
            also_notify: Vec::new(),
        }
    }

    /// Creates a notification event.
    pub fn notification(
        message: impl Into<String>,
        severity: Severity,
        target: Option<Identity>,
    ) -> Self {
        DomainEvent::NotificationSent {
            message: message.into(),
            severity,
            target,
        }
    }

    /// Returns the stable wire name for this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            DomainEvent::NoteCreated { .. } => event_names::NOTE_CREATED,
            DomainEvent::NotificationSent { .. } => event_names::NOTIFICATION_SENT,
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Payload of `note.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCreatedPayload {
    pub note: NoteSnapshot,
    pub author: AuthorSnapshot,
    /// Display text, computed once by the publisher.
    pub message: String,
}

/// Payload of `notification.sent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSentPayload {
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    /// ISO-8601 UTC timestamp captured when the envelope was built.
    pub timestamp: String,
}

// =============================================================================
// Tests
// =============================================================================
