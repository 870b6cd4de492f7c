//! Envelope builder and wire message.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    channels, event_names, ChannelSelector, DomainEvent, EventError, NoteCreatedPayload,
    NotificationSentPayload,
};

/// A domain event addressed to its channels, with its payload rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Channels the message is fanned out to. Never empty.
    pub channels: Vec<ChannelSelector>,

    /// Stable dotted event name.
    pub event_name: &'static str,

    /// Payload exactly as it goes on the wire.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Builds the envelope for an event, stamping time-dependent fields with
    /// the current time.
    pub fn build(event: &DomainEvent) -> Result<Self, EventError> {
        Self::build_at(event, Utc::now())
    }

    /// Builds the envelope for an event as of `now`.
    pub fn build_at(event: &DomainEvent, now: DateTime<Utc>) -> Result<Self, EventError> {
        match event {
            DomainEvent::NoteCreated {
                note,
                author,
                also_notify,
            } => {
                let author = author
                    .as_ref()
                    .ok_or(EventError::MissingAuthor { note_id: note.id })?;

                let mut selectors = vec![ChannelSelector::public(channels::NOTES)];
                selectors.extend(
                    also_notify
                        .iter()
                        .map(|identity| ChannelSelector::private(channels::USER, identity.clone())),
                );

                let payload = NoteCreatedPayload {
                    message: format!("{} created a new note: {}", author.name, note.title),
                    note: note.clone(),
                    author: author.clone(),
                };

                Ok(Self {
                    channels: selectors,
                    event_name: event_names::NOTE_CREATED,
                    payload: serde_json::to_value(payload)?,
                })
            }
            DomainEvent::NotificationSent {
                message,
                severity,
                target,
            } => {
                let selector = match target {
                    Some(identity) => {
                        ChannelSelector::private(channels::NOTIFICATIONS, identity.clone())
                    }
                    None => ChannelSelector::public(channels::NOTIFICATIONS),
                };

                let payload = NotificationSentPayload {
                    message: message.clone(),
                    severity: *severity,
                    timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
                };

                Ok(Self {
                    channels: vec![selector],
                    event_name: event_names::NOTIFICATION_SENT,
                    payload: serde_json::to_value(payload)?,
                })
            }
        }
    }

    /// The message every selected channel receives.
    pub fn wire_message(&self) -> WireMessage {
        WireMessage {
            event_name: self.event_name.to_string(),
            payload: self.payload.clone(),
        }
    }
}

/// Serialized form placed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "eventName")]
    pub event_name: String,
    pub payload: serde_json::Value,
}

impl WireMessage {
    pub fn new(event_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
        }
    }

    /// Content hash of the message, independent of key order.
    ///
    /// Redelivered copies of one publish hash identically, which is what the
    /// receiving side deduplicates on.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.event_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical_json(&self.payload).as_bytes());
        let digest = hasher.finalize();
        format!("sha256:{}", hex::encode(&digest[..16]))
    }
}

/// Canonical JSON: sorted keys, no insignificant whitespace.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let inner: Vec<String> = pairs
                .iter()
                .map(|(k, v)| {
                    let key = serde_json::Value::String((*k).clone());
                    format!("{key}:{}", canonical_json(v))
                })
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        serde_json::Value::Array(arr) => {
            let inner: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        other => other.to_string(),
    }
}
