//! Event publisher.

use std::sync::Arc;

use notecast_events::{DomainEvent, Envelope};
use notecast_id::SocketId;
use tracing::{debug, error, info};

use crate::{Broadcaster, PublishError};

/// Per-publish options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Skip delivery to the connection that triggered the event.
    pub exclude_originator: bool,

    /// Connection of the originator, as reported by its client.
    pub socket_id: Option<SocketId>,
}

impl PublishOptions {
    /// Deliver to everyone except `socket_id`.
    pub fn to_others(socket_id: Option<SocketId>) -> Self {
        Self {
            exclude_originator: true,
            socket_id,
        }
    }

    /// Connection to exclude, if suppression was requested and is possible.
    pub fn except(&self) -> Option<&SocketId> {
        if self.exclude_originator {
            self.socket_id.as_ref()
        } else {
            None
        }
    }
}

/// Builds envelopes and hands them to a [`Broadcaster`].
#[derive(Clone)]
pub struct Publisher {
    broadcaster: Arc<dyn Broadcaster>,
}

impl Publisher {
    pub fn new(broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { broadcaster }
    }

    /// Publishes one event.
    ///
    /// Returns once the broadcaster accepted the message; nothing is known
    /// about delivery to individual subscribers.
    pub async fn publish(
        &self,
        event: &DomainEvent,
        options: PublishOptions,
    ) -> Result<(), PublishError> {
        let envelope = Envelope::build(event)?;
        let message = envelope.wire_message();

        if options.exclude_originator && options.socket_id.is_none() {
            debug!(
                event_name = envelope.event_name,
                "Originator exclusion requested without a socket id, delivering to all"
            );
        }

        let channels: Vec<String> = envelope.channels.iter().map(|c| c.name()).collect();

        match self
            .broadcaster
            .broadcast(&envelope.channels, &message, options.except())
            .await
        {
            Ok(()) => {
                info!(
                    event_name = envelope.event_name,
                    channels = ?channels,
                    broadcaster = self.broadcaster.name(),
                    "Event published"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    error = %e,
                    event_name = envelope.event_name,
                    channels = ?channels,
                    broadcaster = self.broadcaster.name(),
                    "Failed to publish event"
                );
                Err(e.into())
            }
        }
    }
}
