//! TCP and TLS listeners merged into one accept sequence.
//!
//! # Responsibilities
//! - Bind the configured plain and TLS ports
//! - Accept incoming TCP connections on every listener concurrently
//! - Merge them into a single sequence for the server loop
//! - Defer TLS handshakes to the per-connection task

use std::net::SocketAddr;
use std::path::Path;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::config::ListenerConfig;
use crate::net::connection::Connection;
use crate::net::tls::load_tls_acceptor;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to load certificate material.
    Tls(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Tls(e) => write!(f, "Failed to load TLS material: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A bound listener, optionally terminating TLS.
pub struct Listener {
    inner: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl Listener {
    /// Wrap an already bound plain listener.
    pub fn plain(inner: TcpListener) -> Self {
        Self { inner, tls: None }
    }

    /// Wrap an already bound listener that terminates TLS with `acceptor`.
    pub fn tls(inner: TcpListener, acceptor: TlsAcceptor) -> Self {
        Self {
            inner,
            tls: Some(acceptor),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::trace!(peer_addr = %peer, tls = self.is_tls(), "Connection accepted");
        Ok(Accepted {
            stream,
            peer,
            tls: self.tls.clone(),
        })
    }
}

/// A raw accepted socket whose TLS handshake, if any, has not run yet.
pub struct Accepted {
    stream: TcpStream,
    peer: SocketAddr,
    tls: Option<TlsAcceptor>,
}

impl Accepted {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Complete the TLS handshake when the listener terminates TLS.
    pub async fn establish(self) -> Result<Connection, std::io::Error> {
        match self.tls {
            None => Ok(Connection::new(self.stream, self.peer)),
            Some(acceptor) => {
                let stream = acceptor.accept(self.stream).await?;
                Ok(Connection::new(stream, self.peer))
            }
        }
    }
}

/// Bind every listener named in the configuration.
pub async fn bind_all(config: &ListenerConfig) -> Result<Vec<Listener>, ListenerError> {
    let mut listeners = Vec::new();

    if let Some(http) = &config.http {
        let inner = bind(&config.bind_address, http.port).await?;
        tracing::info!(port = local_port(&inner), "Http server is listening");
        listeners.push(Listener::plain(inner));
    }

    if let Some(https) = &config.https {
        let acceptor = load_tls_acceptor(Path::new(&https.cert_path), Path::new(&https.key_path))
            .await
            .map_err(ListenerError::Tls)?;
        let inner = bind(&config.bind_address, https.port).await?;
        tracing::info!(port = local_port(&inner), "Https server is listening");
        listeners.push(Listener::tls(inner, acceptor));
    }

    Ok(listeners)
}

async fn bind(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    TcpListener::bind((host, port)).await.map_err(ListenerError::Bind)
}

fn local_port(listener: &TcpListener) -> u16 {
    listener.local_addr().map(|a| a.port()).unwrap_or_default()
}

/// Merges the accept streams of several listeners.
///
/// Each listener runs its own accept task. An accept error is forwarded and
/// ends that listener's task; the mux ends once every task has ended.
pub struct ListenerMux {
    rx: mpsc::UnboundedReceiver<Result<Accepted, ListenerError>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ListenerMux {
    pub fn new(listeners: Vec<Listener>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let tasks = listeners
            .into_iter()
            .map(|listener| {
                let tx = tx.clone();
                tokio::spawn(async move {
                    loop {
                        let accepted = listener.accept().await;
                        let failed = accepted.is_err();
                        if tx.send(accepted).is_err() || failed {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self { rx, tasks }
    }

    /// Next accepted connection from any listener.
    pub async fn next(&mut self) -> Option<Result<Accepted, ListenerError>> {
        self.rx.recv().await
    }
}

impl Drop for ListenerMux {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn mux_merges_listeners() {
        let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (addr_a, addr_b) = (a.local_addr().unwrap(), b.local_addr().unwrap());
        let mut mux = ListenerMux::new(vec![Listener::plain(a), Listener::plain(b)]);

        let mut client_a = TcpStream::connect(addr_a).await.unwrap();
        let mut client_b = TcpStream::connect(addr_b).await.unwrap();
        client_a.write_all(b"a").await.unwrap();
        client_b.write_all(b"b").await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let accepted = mux.next().await.unwrap().unwrap();
            let mut conn = accepted.establish().await.unwrap();
            let mut byte = [0u8; 1];
            conn.transport.read_exact(&mut byte).await.unwrap();
            seen.push(byte[0]);
        }
        seen.sort();
        assert_eq!(seen, b"ab");
    }

    #[tokio::test]
    async fn bind_all_skips_absent_listeners() {
        let config = ListenerConfig {
            bind_address: "127.0.0.1".into(),
            http: None,
            https: None,
        };
        assert!(bind_all(&config).await.unwrap().is_empty());
    }
}
