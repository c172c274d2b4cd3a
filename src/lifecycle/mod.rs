//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     CLI → Load config → Validate → Init logging → Bind listeners → Accept
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Stop accepting → In-flight connections finish on their own
//!
//! Fatal error:
//!     Force-enable logging → Log at error → Flush delay → Exit(1)
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
