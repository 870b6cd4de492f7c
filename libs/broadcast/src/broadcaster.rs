//! Fan-out transport seam.

use async_trait::async_trait;
use notecast_events::{ChannelSelector, WireMessage};
use notecast_id::SocketId;

use crate::BroadcastError;

/// Delivers one wire message to every current subscriber of the given
/// channels.
///
/// Implementations must be safe to call concurrently; the publisher does not
/// serialize calls.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fans `message` out to `channels`, skipping the connection `except`
    /// when given.
    async fn broadcast(
        &self,
        channels: &[ChannelSelector],
        message: &WireMessage,
        except: Option<&SocketId>,
    ) -> Result<(), BroadcastError>;
}
