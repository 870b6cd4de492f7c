//! # notecast-id
//!
//! Identifier types shared by the notecast publisher and receivers.
//!
//! ## Kinds of identifier
//!
//! - Generated IDs use a prefixed ULID format: `{prefix}_{ulid}`, e.g.
//!   `ntf_01HV4Z2WQXKJNM8GPQY6VBKC3D`. They are time-ordered and never reused.
//! - [`Identity`] is an opaque token naming the observing actor. It is only
//!   ever used to derive private channel names, so it carries no ownership or
//!   authorization meaning.
//! - [`SocketId`] names one transport connection so a publisher can exclude
//!   the originator of an action from fan-out.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
