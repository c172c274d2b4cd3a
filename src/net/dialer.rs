//! Outbound dialing for CONNECT tunnels.

use std::io;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::net::connection::BoxedTransport;

/// Opens the raw outbound stream behind a tunnel.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> io::Result<BoxedTransport>;
}

/// Plain TCP with `TCP_NODELAY` set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn connect(&self, host: &str, port: u16) -> io::Result<BoxedTransport> {
        let stream = TcpStream::connect((host, port)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::trace!(error = %e, "set_nodelay failed");
        }
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_dialer_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut stream = TcpDialer.connect("127.0.0.1", port).await.unwrap();
        let (mut accepted, _) = listener.accept().await.unwrap();

        stream.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[tokio::test]
    async fn refused_dial_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(TcpDialer.connect("127.0.0.1", port).await.is_err());
    }
}
