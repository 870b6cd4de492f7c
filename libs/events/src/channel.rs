//! Channel addressing.

use notecast_id::Identity;
use serde::{Deserialize, Serialize};

/// Well-known channel names.
pub mod channels {
    /// Public channel carrying every `note.created` event.
    pub const NOTES: &str = "notes";
    /// Public channel and private base for `notification.sent`.
    pub const NOTIFICATIONS: &str = "notifications";
    /// Private base for per-user note fan-out.
    pub const USER: &str = "user";
}

/// Prefix a Pusher-compatible transport expects on private channel names.
pub const PRIVATE_WIRE_PREFIX: &str = "private-";

/// Whether a channel is open to everyone or scoped to one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Public,
    Private,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Public => write!(f, "public"),
            ChannelKind::Private => write!(f, "private"),
        }
    }
}

/// Addresses one channel an envelope is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelSelector {
    Public { name: String },
    Private { base: String, identity: Identity },
}

impl ChannelSelector {
    pub fn public(name: impl Into<String>) -> Self {
        ChannelSelector::Public { name: name.into() }
    }

    pub fn private(base: impl Into<String>, identity: Identity) -> Self {
        ChannelSelector::Private {
            base: base.into(),
            identity,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelSelector::Public { .. } => ChannelKind::Public,
            ChannelSelector::Private { .. } => ChannelKind::Private,
        }
    }

    /// Channel name as subscribers know it: `name` or `<base>.<identity>`.
    pub fn name(&self) -> String {
        match self {
            ChannelSelector::Public { name } => name.clone(),
            ChannelSelector::Private { base, identity } => private_channel_name(base, identity),
        }
    }

    /// Name used on a Pusher-compatible wire, where private channels carry
    /// the `private-` prefix.
    pub fn wire_name(&self) -> String {
        match self.kind() {
            ChannelKind::Public => self.name(),
            ChannelKind::Private => format!("{PRIVATE_WIRE_PREFIX}{}", self.name()),
        }
    }
}

impl std::fmt::Display for ChannelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// Derives the private channel name for an identity.
pub fn private_channel_name(base: &str, identity: &Identity) -> String {
    format!("{base}.{identity}")
}
