//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound work:
//!     → timeouts.rs (deadline on dial, deadline plus cancellation on requests)
//!     → ProxyError::Timeout on expiry
//! ```
//!
//! # Design Decisions
//! - Every outbound operation has a deadline
//! - No retries: a failed dial or request is reported, never repeated

pub mod timeouts;
