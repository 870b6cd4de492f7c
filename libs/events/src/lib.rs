//! # notecast-events
//!
//! Domain events and their wire representation.
//!
//! ## Design Principles
//!
//! - Domain events are a closed tagged union; the envelope builder matches on
//!   it exhaustively so an ad-hoc payload can never reach the wire
//! - Event names are stable dotted strings (`note.created`,
//!   `notification.sent`) that do not follow Rust variant names
//! - Payload shapes are part of the wire contract, including the
//!   human-readable `message` computed at build time
//!
//! ## Flow
//!
//! [`DomainEvent`] → [`Envelope::build`] → [`Envelope`] (selectors, event
//! name, payload) → [`WireMessage`] handed to a transport.

mod channel;
mod envelope;
mod error;
mod types;

pub use channel::*;
pub use envelope::*;
pub use error::EventError;
pub use types::*;
