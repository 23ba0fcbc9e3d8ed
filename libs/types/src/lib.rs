//! Types library for the odds feed SDK
//!
//! Provides the value types shared between the feed consumer, the producer
//! directory and the recovery subsystem. Everything here is plain data:
//! no I/O, no locking.
//!
//! # Modules
//! - `ids`: Identifiers (ProducerId, RequestId, SessionId, Urn)
//! - `interest`: Message interests (routing key filters)
//! - `producer`: Producer scopes, records and recovery info
//! - `recovery`: Recovery states, producer up/down/status reasons, message timestamps
//! - `errors`: Parse error taxonomy
//!
//! All timestamps are Unix milliseconds; `0` means "never".

pub mod ids;
pub mod interest;
pub mod producer;
pub mod recovery;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::interest::*;
    pub use crate::producer::*;
    pub use crate::recovery::*;
    pub use crate::errors::*;
}
