//! # notecast-receiver
//!
//! Receiving side of notecast. One [`NotificationSession`] per observer:
//!
//! - [`SubscriptionManager`] opens the public channels and the private
//!   channel of the current identity, and swaps the private one when the
//!   identity changes
//! - [`ReactionDispatcher`] turns received wire messages into reactions
//! - [`NotificationStore`] holds the bounded, deduplicated list of
//!   notifications currently on screen, each expiring on its own timer
//!
//! The transport itself is external and plugs in through [`Transport`].
//! Everything here expects to run inside a tokio runtime.

mod config;
mod dispatch;
mod error;
#[cfg(test)]
mod fake;
mod session;
mod store;
mod subscription;
mod transport;

pub use config::ReceiverConfig;
pub use dispatch::{Reaction, ReactionDispatcher, ReactionSet, RefreshSignal};
pub use error::{ConfigError, HandlerError, SessionError, TransportError};
pub use session::NotificationSession;
pub use store::{Clock, Notification, NotificationStore, StoreConfig, SystemClock};
pub use subscription::{
    ChannelPlan, DeliveryContext, EventHandler, SubscriptionManager, SubscriptionState,
};
pub use transport::{
    transport_slot, ChannelHandle, RawHandler, Transport, TransportProvider, TransportReady,
};
