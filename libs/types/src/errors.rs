//! Error types for parsing feed identifiers
//!
//! Errors raised by the stateful layers (directory, transport, recovery)
//! live with those layers; this module only covers value parsing.

use thiserror::Error;

/// Failure to parse a textual feed value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid URN: {value}")]
    InvalidUrn { value: String },

    #[error("Invalid URN id in {value}: {reason}")]
    InvalidUrnId { value: String, reason: String },

    #[error("Unknown message interest: {value}")]
    UnknownInterest { value: String },

    #[error("Unknown producer scope: {value}")]
    UnknownScope { value: String },
}
