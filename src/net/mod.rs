//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept loop per listener, merged mux)
//!     → tls.rs (certificate loading for TLS listeners)
//!     → connection.rs (handshake done, transport boxed, id assigned)
//!     → Hand off to proxy::handler
//!
//! Outbound tunnel stream
//!     → dialer.rs (TCP dial behind the Dialer trait)
//! ```
//!
//! # Design Decisions
//! - No connection cap: every accepted socket gets its own task
//! - TLS handshakes run in the connection task, not the accept loop
//! - Plain and TLS connections look identical past this layer

pub mod connection;
pub mod dialer;
pub mod listener;
pub mod tls;

pub use connection::{safe_close, BoxedTransport, Connection, ConnectionId, Transport};
pub use dialer::{Dialer, TcpDialer};
pub use listener::{bind_all, Accepted, Listener, ListenerError, ListenerMux};
