//! Reaction dispatcher.
//!
//! Turns a delivered message into local side effects: a notification in the
//! store, a refresh signal for cached note lists, or nothing at all.

use std::sync::Arc;

use notecast_events::{event_names, ChannelKind, Severity, WireMessage};
use notecast_id::{Identity, NotificationId};
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::{DeliveryContext, EventHandler, HandlerError, NotificationStore};

/// Emitted when locally cached note data should be reloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSignal {
    pub event_name: String,
    pub payload: serde_json::Value,
}

/// One side effect of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// A notification was added to the store.
    Notified {
        id: NotificationId,
        severity: Severity,
    },
    /// The message was a redelivery of one already on display.
    Deduplicated,
    /// The note was authored by this session's identity; no notification.
    Suppressed,
    /// A refresh signal was emitted.
    Refresh,
}

/// Everything one dispatch did, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSet(Vec<Reaction>);

impl ReactionSet {
    fn push(&mut self, reaction: Reaction) {
        self.0.push(reaction);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reaction> {
        self.0.iter()
    }

    pub fn contains(&self, reaction: &Reaction) -> bool {
        self.0.contains(reaction)
    }

    /// Id of the notification this dispatch added, if any.
    pub fn notified(&self) -> Option<NotificationId> {
        self.0.iter().find_map(|r| match r {
            Reaction::Notified { id, .. } => Some(*id),
            _ => None,
        })
    }
}

// Incoming payloads are decoded leniently: producers on older versions may
// omit optional fields.

#[derive(Debug, Deserialize)]
struct IncomingNotification {
    message: String,
    #[serde(rename = "type")]
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingNoteCreated {
    message: Option<String>,
    note: Option<IncomingNote>,
    author: Option<IncomingAuthor>,
}

#[derive(Debug, Deserialize)]
struct IncomingNote {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingAuthor {
    id: Option<Identity>,
    name: Option<String>,
}

impl IncomingNoteCreated {
    fn display_message(self, kind: ChannelKind) -> String {
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            return message;
        }

        match kind {
            ChannelKind::Private => {
                let title = self
                    .note
                    .and_then(|n| n.title)
                    .unwrap_or_else(|| "Untitled".to_string());
                format!("New note created: {title}")
            }
            ChannelKind::Public => {
                let name = self
                    .author
                    .and_then(|a| a.name)
                    .unwrap_or_else(|| "Someone".to_string());
                format!("{name} created a new note")
            }
        }
    }
}

/// Routes delivered messages to the store and the refresh channel.
#[derive(Clone)]
pub struct ReactionDispatcher {
    store: NotificationStore,
    refresh: broadcast::Sender<RefreshSignal>,
    suppress_own_notes: bool,
    identity: watch::Receiver<Option<Identity>>,
}

impl ReactionDispatcher {
    /// `identity` tracks the session's current identity, which decides what
    /// counts as an own note.
    pub fn new(
        store: NotificationStore,
        refresh: broadcast::Sender<RefreshSignal>,
        suppress_own_notes: bool,
        identity: watch::Receiver<Option<Identity>>,
    ) -> Self {
        Self {
            store,
            refresh,
            suppress_own_notes,
            identity,
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// New receiver of refresh signals.
    pub fn refresh_signals(&self) -> broadcast::Receiver<RefreshSignal> {
        self.refresh.subscribe()
    }

    /// Wraps the dispatcher as a subscription handler.
    pub fn into_handler(self) -> EventHandler {
        let dispatcher = Arc::new(self);
        Arc::new(move |ctx: &DeliveryContext, msg: &WireMessage| {
            dispatcher.dispatch(ctx, msg).map(|_| ())
        })
    }

    pub fn dispatch(
        &self,
        ctx: &DeliveryContext,
        msg: &WireMessage,
    ) -> Result<ReactionSet, HandlerError> {
        match msg.event_name.as_str() {
            event_names::NOTIFICATION_SENT => self.on_notification(msg),
            event_names::NOTE_CREATED => self.on_note_created(ctx, msg),
            other => {
                debug!(event_name = other, channel = %ctx.channel, "Ignoring unknown event");
                Ok(ReactionSet::default())
            }
        }
    }

    fn on_notification(&self, msg: &WireMessage) -> Result<ReactionSet, HandlerError> {
        let incoming: IncomingNotification = decode(msg)?;
        let severity = Severity::from_wire(incoming.severity.as_deref());

        let mut reactions = ReactionSet::default();
        reactions.push(self.notify(incoming.message, severity, msg));
        Ok(reactions)
    }

    fn on_note_created(
        &self,
        ctx: &DeliveryContext,
        msg: &WireMessage,
    ) -> Result<ReactionSet, HandlerError> {
        let incoming: IncomingNoteCreated = decode(msg)?;
        let mut reactions = ReactionSet::default();

        let own_note = match (self.identity.borrow().as_ref(), incoming.author.as_ref()) {
            (Some(me), Some(author)) => author.id.as_ref() == Some(me),
            _ => false,
        };

        if self.suppress_own_notes && own_note {
            debug!(channel = %ctx.channel, "Suppressing notification for own note");
            reactions.push(Reaction::Suppressed);
        } else {
            let severity = match ctx.kind {
                ChannelKind::Private => Severity::Success,
                ChannelKind::Public => Severity::Info,
            };
            let message = incoming.display_message(ctx.kind);
            reactions.push(self.notify(message, severity, msg));
        }

        let signal = RefreshSignal {
            event_name: msg.event_name.clone(),
            payload: msg.payload.clone(),
        };
        if self.refresh.send(signal).is_err() {
            debug!("No refresh listeners");
        }
        reactions.push(Reaction::Refresh);

        Ok(reactions)
    }

    fn notify(&self, message: String, severity: Severity, msg: &WireMessage) -> Reaction {
        match self.store.add_unique(message, severity, msg.fingerprint()) {
            Some(id) => {
                info!(
                    notification_id = %id,
                    event_name = %msg.event_name,
                    severity = %severity,
                    "Notification added"
                );
                Reaction::Notified { id, severity }
            }
            None => Reaction::Deduplicated,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(msg: &WireMessage) -> Result<T, HandlerError> {
    T::deserialize(&msg.payload).map_err(|e| HandlerError::MalformedPayload {
        event_name: msg.event_name.clone(),
        reason: e.to_string(),
    })
}
