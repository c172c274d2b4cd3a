//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (connection_id, source, destination, error)
//!     → logging.rs (console sink, file sink with rotation)
//! ```
//!
//! # Design Decisions
//! - One reloadable level filter per sink, so fatal errors can always be logged
//! - Logging is configured once at startup; sinks never change after that

pub mod logging;

pub use logging::{LogHandle, LoggingError};
