//! Per-connection orchestration.
//!
//! ```text
//! Parsing → Authenticating → Tunneling (CONNECT)  → Closed
//!                          → Proxying  (others)   → Closed
//! ```
//!
//! Every path ends in `Closed`: the client transport is shut down before
//! `handle` returns, whatever happened before.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::request::{Request, RequestParser};
use crate::net::connection::{safe_close, Connection, ConnectionId};
use crate::net::dialer::{Dialer, TcpDialer};
use crate::proxy::forward::{self, upstream_client, UpstreamClient};
use crate::proxy::tunnel;
use crate::security::auth::{authenticate, AuthPolicy};

/// Read-only state shared by every connection task.
pub struct ProxyState {
    pub auth: AuthPolicy,
    pub deadline: Duration,
    pub client: UpstreamClient,
    /// Opens the outbound side of CONNECT tunnels.
    pub dialer: Arc<dyn Dialer>,
}

impl ProxyState {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            auth: config.auth.clone(),
            deadline: config.timeout(),
            client: upstream_client(),
            dialer: Arc::new(TcpDialer),
        }
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Parsing,
    Authenticating,
    Tunneling,
    Proxying,
    Closed,
}

/// Everything one connection's subtasks share.
#[derive(Debug)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    /// Fired once by whichever subtask stops first; observed by all of them.
    pub cancel: CancellationToken,
    pub deadline: Duration,
    state: ConnectionState,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, peer: SocketAddr, deadline: Duration) -> Self {
        Self {
            id,
            peer,
            cancel: CancellationToken::new(),
            deadline,
            state: ConnectionState::Parsing,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "Connection state");
        self.state = next;
    }
}

/// Drives one accepted connection from first byte to close.
#[derive(Clone)]
pub struct ConnectionHandler {
    state: Arc<ProxyState>,
}

impl ConnectionHandler {
    pub fn new(state: Arc<ProxyState>) -> Self {
        Self { state }
    }

    /// Handle the connection. Errors are logged here and never returned.
    pub async fn handle(&self, conn: Connection) -> ConnectionState {
        let Connection { id, peer, transport } = conn;
        let mut ctx = ConnectionContext::new(id, peer, self.state.deadline);
        let (reader, mut writer) = tokio::io::split(transport);

        let parsed = RequestParser::new(reader)
            .with_cancellation(ctx.cancel.clone())
            .parse()
            .await;

        match parsed {
            // Peer closed before sending anything.
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(connection_id = %ctx.id, source = %ctx.peer, error = %e, "Request parse failed");
            }
            Ok(Some(request)) => {
                let kind = if request.is_connect() { "Tunnel" } else { "Proxy" };
                let destination = request.target.to_string();

                if let Err(e) = self.dispatch(&mut ctx, request, &mut writer).await {
                    tracing::warn!(
                        connection_id = %ctx.id,
                        source = %ctx.peer,
                        destination = %destination,
                        timed_out = e.is_timeout(),
                        error = %e,
                        "{} failed",
                        kind
                    );
                }
            }
        }

        // Stops a chunked body still feeding a dropped outbound request.
        ctx.cancel.cancel();
        safe_close(&mut writer).await;
        ctx.transition(ConnectionState::Closed);
        ctx.state()
    }

    async fn dispatch<R, W>(&self, ctx: &mut ConnectionContext, mut request: Request<R>, writer: &mut W) -> Result<(), ProxyError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        ctx.transition(ConnectionState::Authenticating);
        authenticate(&request.headers, &self.state.auth, writer).await?;

        if request.is_connect() {
            ctx.transition(ConnectionState::Tunneling);
            let reader = request
                .take_reader()
                .ok_or_else(|| ProxyError::Parse("CONNECT request lost its reader".into()))?;
            tunnel::run(reader, writer, &request.target, self.state.dialer.as_ref(), ctx).await
        } else {
            ctx.transition(ConnectionState::Proxying);
            forward::run(request, writer, &self.state.client, ctx).await
        }
    }
}
