//! # notecast-broadcast
//!
//! Server-side half of notecast: turns domain events into envelopes and hands
//! them to a fan-out transport.
//!
//! - [`Broadcaster`] is the transport seam. [`HttpBroadcaster`] talks to a
//!   Pusher-compatible HTTP events endpoint.
//! - [`Publisher`] builds the envelope and forwards it. It keeps no state
//!   besides the broadcaster handle and never retries; retry policy belongs
//!   to the transport.

mod broadcaster;
mod config;
mod error;
mod http;
mod publisher;

pub use broadcaster::Broadcaster;
pub use config::{BroadcastConfig, ConfigError};
pub use error::{BroadcastError, PublishError};
pub use http::HttpBroadcaster;
pub use publisher::{PublishOptions, Publisher};
