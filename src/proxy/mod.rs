//! Per-connection proxying.
//!
//! # Data Flow
//! ```text
//! Connection
//!     → handler.rs (parse, authenticate, dispatch)
//!         → tunnel.rs  (CONNECT: dial, 200 line, raw byte pumps)
//!         → forward.rs (absolute URL: outbound request, response relay)
//!     → close
//! ```

pub mod forward;
pub mod handler;
pub mod tunnel;

pub use forward::{upstream_client, UpstreamClient};
pub use handler::{ConnectionContext, ConnectionHandler, ConnectionState, ProxyState};
