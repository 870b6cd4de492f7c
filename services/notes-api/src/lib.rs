//! notecast notes API.
//!
//! This crate ships the `notes-api` binary. The library surface exists so the
//! router can be exercised in tests against any [`Broadcaster`].
//!
//! [`Broadcaster`]: notecast_broadcast::Broadcaster

pub mod api;
pub mod config;
pub mod notes;
pub mod state;
