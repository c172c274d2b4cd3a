//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request head:
//!     → auth.rs (check Proxy-Authorization against the configured policy)
//!     → 407 challenge and close on failure
//!     → Pass to tunnel or forward
//! ```
//!
//! # Design Decisions
//! - Fail closed: a request is never forwarded after a failed check
//! - Credentials never leave the proxy; the header is stripped before forwarding

pub mod auth;

pub use auth::{authenticate, AuthPolicy};
