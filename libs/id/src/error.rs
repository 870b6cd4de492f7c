//! Errors raised while parsing identifiers.

use thiserror::Error;

/// Why a string was not accepted as an identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("ID cannot be empty")]
    Empty,

    /// Prefixed IDs only: the prefix names another kind of ID.
    #[error("invalid ID prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    #[error("ID missing underscore separator")]
    MissingSeparator,

    #[error("invalid ULID: {0}")]
    InvalidUlid(String),

    /// The token contains characters that cannot appear in a channel name.
    #[error("invalid character {found:?} in {kind}")]
    InvalidCharacter { kind: &'static str, found: char },
}
