//! Feed Recovery Service
//!
//! Watches every producer of the odds feed for staleness and drives replay
//! requests against the recovery REST API:
//! - Alive heartbeat and processing-delay health checks
//! - Full snapshot recoveries with multi-scope completion tracking
//! - Per-event odds / stateful recoveries requested by the user
//! - Watchdog for recoveries that never complete
//! - Producer up/down notifications on a single outbound stream
//!
//! # Architecture
//!
//! ```text
//!  Session consumer          User            Health loop (10s)
//!        │ FeedSignal          │ initiate_event_*      │
//!    ┌───▼─────────────────────▼───────────────────────▼───┐
//!    │                  RecoveryManager                    │
//!    │   ProducerId → Mutex<ProducerRecoveryState>         │
//!    └───┬──────────────────────┬─────────────────────┬────┘
//!        │                      │                     │
//!  ┌─────▼──────┐      ┌────────▼────────┐     ┌──────▼──────┐
//!  │ Producer   │      │ Recovery        │     │ mpsc        │
//!  │ Directory  │      │ Transport (REST)│     │ RecoveryMsg │
//!  └────────────┘      └─────────────────┘     └─────────────┘
//! ```

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod generator;
pub mod messages;
pub mod orchestrator;
pub mod recovery_data;
pub mod signals;
pub mod state;
pub mod transport;

pub use config::{ApiConfig, Environment, RecoveryConfig};
pub use error::{ConfigError, DirectoryError, RecoveryError, TransportError};
pub use messages::{EventRecoveryMessage, ProducerStatus, RecoveryMessage};
pub use orchestrator::{RecoveryManager, RecoveryStatus};
pub use signals::{EventRecoveryInitiator, FeedSignal, NoopRecoveryProcessor, RecoveryMessageProcessor};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
