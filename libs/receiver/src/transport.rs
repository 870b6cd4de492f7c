//! Transport seam and readiness handshake.
//!
//! A transport client (WebSocket, Pusher, in-memory hub) is created by the
//! host, often after the session object already exists. The host resolves
//! readiness once through [`TransportProvider::provide`]; the subscription
//! manager awaits [`TransportReady::wait`] instead of polling for it.

use std::sync::Arc;

use notecast_events::ChannelKind;
use tokio::sync::watch;

use crate::{SessionError, TransportError};

/// Callback a transport invokes with the payload of each matching message.
pub type RawHandler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// An open channel on the transport.
pub trait ChannelHandle: Send + Sync {
    /// Registers `handler` for messages named `event_name` on this channel.
    fn on(&self, event_name: &str, handler: RawHandler);
}

/// Client side of a fan-out transport.
///
/// Delivery is at least once while connected and subscribed. No ordering is
/// promised across channels.
pub trait Transport: Send + Sync {
    /// Opens (or joins) a channel.
    fn subscribe(
        &self,
        kind: ChannelKind,
        name: &str,
    ) -> Result<Box<dyn ChannelHandle>, TransportError>;

    /// Leaves a channel. Unknown names are ignored.
    fn unsubscribe(&self, name: &str);
}

type Slot = Option<Arc<dyn Transport>>;

/// Host side of the readiness handshake.
pub struct TransportProvider {
    tx: watch::Sender<Slot>,
}

impl TransportProvider {
    /// Makes the transport available to the waiting session.
    pub fn provide(&self, transport: Arc<dyn Transport>) {
        self.tx.send_replace(Some(transport));
    }
}

/// Session side of the readiness handshake.
#[derive(Clone)]
pub struct TransportReady {
    rx: watch::Receiver<Slot>,
}

impl TransportReady {
    /// Readiness that is already resolved.
    pub fn ready(transport: Arc<dyn Transport>) -> Self {
        let (_tx, rx) = watch::channel(Some(transport));
        Self { rx }
    }

    /// Whether a transport has been provided.
    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Waits until the transport is provided.
    pub async fn wait(&mut self) -> Result<Arc<dyn Transport>, SessionError> {
        let slot = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SessionError::TransportDropped)?;
        (*slot).clone().ok_or(SessionError::TransportDropped)
    }
}

/// Creates a connected provider/readiness pair.
pub fn transport_slot() -> (TransportProvider, TransportReady) {
    let (tx, rx) = watch::channel(None);
    (TransportProvider { tx }, TransportReady { rx })
}
