//! Error taxonomy for per-connection processing.
//!
//! Every variant here is caught at the connection handler boundary, logged
//! with source/destination context, and ends in connection teardown. None of
//! them escape to the accept loop.

use std::io;

/// Errors raised while parsing, authenticating, or forwarding one connection.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Malformed request line, header line, or target.
    #[error("malformed request: {0}")]
    Parse(String),

    /// The stream ended before the declared `Content-Length` was satisfied.
    #[error("expected {expected} bytes, but received {received} bytes in total")]
    IncompleteBody { expected: usize, received: usize },

    /// The stream ended before a declared chunk was fully available.
    #[error("unexpected EOF in chunked body")]
    UnexpectedEof,

    /// A `Transfer-Encoding` other than `chunked`.
    #[error("unsupported Transfer-Encoding: {0} from client")]
    UnsupportedEncoding(String),

    /// Missing or invalid proxy credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Deadline exceeded on an outbound dial or request.
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: &'static str, millis: u64 },

    /// Read or write failure on either side of the connection.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The outbound HTTP client failed to produce a response.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// Failure while streaming an upstream response body.
    #[error("upstream body failed: {0}")]
    Http(#[from] hyper::Error),

    /// The connection's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}

impl ProxyError {
    /// Whether this error came from the deadline rather than the peer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProxyError::Timeout { .. })
    }
}
