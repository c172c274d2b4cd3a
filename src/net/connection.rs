//! Accepted client connections.
//!
//! # Responsibilities
//! - Erase the difference between plain TCP and TLS-terminated streams
//! - Generate unique connection IDs for log correlation
//! - Close the transport on every exit path

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Global counter for connection IDs. Relaxed ordering: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Byte stream a client connection runs over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub type BoxedTransport = Box<dyn Transport>;

/// One client connection, ready for the request parser.
pub struct Connection {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub transport: BoxedTransport,
}

impl Connection {
    pub fn new<T: Transport>(transport: T, peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            transport: Box::new(transport),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Shut down the write side, ignoring errors from an already-dead peer.
///
/// The socket itself closes when the last half is dropped.
pub async fn safe_close<W>(writer: &mut W)
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if let Err(e) = writer.shutdown().await {
        tracing::trace!(error = %e, "Shutdown on closed transport");
    }
}
