//! Error types for the recovery subsystem

use thiserror::Error;
use types::errors::ParseError;
use types::ids::{ProducerId, RequestId};

/// Producer directory failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("missing producer {0}")]
    UnknownProducer(ProducerId),

    #[error("required non zero timestamp")]
    ZeroTimestamp,

    #[error("recovery timestamp {timestamp} for producer {producer_id} is older than the {window_minutes} minute recovery window")]
    OutsideRecoveryWindow {
        producer_id: ProducerId,
        timestamp: i64,
        window_minutes: u32,
    },

    #[error("producer {producer_id} has an invalid scope: {source}")]
    UnknownScope {
        producer_id: ProducerId,
        #[source]
        source: ParseError,
    },
}

/// Recovery REST API failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to build request: {0}")]
    Request(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("failed to {method} {path} with status code {status}")]
    Status {
        method: String,
        path: String,
        status: u16,
    },

    #[error("api server returned err - {message}")]
    Api { status: u16, message: String },
}

/// Configuration validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max inactivity seconds must be within [{min}, {max}], got {value}")]
    InactivityOutOfRange { value: u64, min: u64, max: u64 },

    #[error("max recovery execution minutes must be positive")]
    ZeroRecoveryExecution,

    #[error("max recovery execution minutes must be at most {max}, got {value}")]
    RecoveryExecutionTooLong { value: u64, max: u64 },

    #[error("message channel capacity must be positive")]
    ZeroChannelCapacity,

    #[error("tick period must be positive")]
    ZeroTickPeriod,

    #[error("unknown environment has no {0} endpoint")]
    UnknownEnvironment(&'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Top-level recovery error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("recovery manager already opened")]
    AlreadyOpened,

    #[error("recovery manager closed")]
    Closed,

    #[error("inconsistent recovery state for producer {producer_id}, request {request_id}")]
    InconsistentState {
        producer_id: ProducerId,
        request_id: RequestId,
    },

    #[error("event recovery {request_id} failed: {source}")]
    EventRecoveryFailed {
        request_id: RequestId,
        #[source]
        source: TransportError,
    },

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
