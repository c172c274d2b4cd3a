//! Accept loop.
//!
//! One task per accepted connection, no cap on how many run at once. The
//! loop stops on shutdown or on the first accept error; connections already
//! spawned keep running.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::net::listener::{Accepted, ListenerError, ListenerMux};
use crate::proxy::handler::{ConnectionHandler, ProxyState};

/// The forward proxy server.
pub struct ProxyServer {
    handler: ConnectionHandler,
}

impl ProxyServer {
    pub fn new(config: &ProxyConfig) -> Self {
        let state = Arc::new(ProxyState::from_config(config));
        Self {
            handler: ConnectionHandler::new(state),
        }
    }

    /// Accept from `mux` until it ends, fails, or `shutdown` fires.
    pub async fn run(&self, mut mux: ListenerMux, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        let stop = stopped(&mut shutdown);
        tokio::pin!(stop);

        loop {
            let accepted = tokio::select! {
                _ = &mut stop => {
                    tracing::info!("Accept loop stopped");
                    return Ok(());
                }
                next = mux.next() => match next {
                    Some(accepted) => accepted?,
                    None => return Ok(()),
                },
            };
            self.spawn(accepted);
        }
    }

    fn spawn(&self, accepted: Accepted) {
        let handler = self.handler.clone();
        tokio::spawn(async move {
            let peer = accepted.peer();
            match accepted.establish().await {
                Ok(conn) => {
                    handler.handle(conn).await;
                }
                Err(e) => tracing::warn!(source = %peer, error = %e, "TLS handshake failed"),
            }
        });
    }
}

/// Resolves on a shutdown signal. A dropped sender never resolves it.
fn stopped(shutdown: &mut broadcast::Receiver<()>) -> impl Future<Output = ()> + '_ {
    async move {
        loop {
            match shutdown.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
                Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }
}
