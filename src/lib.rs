//! Forward HTTP/HTTPS proxy library.
//!
//! Clients speak HTTP/1.1 to the proxy, either `CONNECT host:port` to open a
//! raw tunnel or an absolute-URL request to be forwarded. Plain and TLS
//! listeners feed the same per-connection handler.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod security;
pub mod server;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use lifecycle::Shutdown;
pub use server::ProxyServer;
