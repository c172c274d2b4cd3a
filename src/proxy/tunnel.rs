//! CONNECT tunnels.
//!
//! After the dial succeeds and the client has been told so, bytes are pumped
//! in both directions with no further HTTP framing. The first direction to
//! finish, cleanly or not, fires the connection's cancellation token and the
//! other direction stops.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::http::request::Target;
use crate::http::response::TUNNEL_ESTABLISHED;
use crate::net::connection::safe_close;
use crate::net::dialer::Dialer;
use crate::proxy::handler::ConnectionContext;
use crate::resilience::timeouts;

/// Dial `target` and relay bytes until either side stops.
pub async fn run<R, W>(
    mut client_reader: R,
    client_writer: &mut W,
    target: &Target,
    dialer: &dyn Dialer,
    ctx: &ConnectionContext,
) -> Result<(), ProxyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let outbound = timeouts::connect(dialer.connect(&target.hostname, target.port), ctx.deadline).await?;

    client_writer.write_all(TUNNEL_ESTABLISHED).await?;
    client_writer.flush().await?;

    tracing::info!(
        connection_id = %ctx.id,
        source = %ctx.peer,
        destination = %target,
        "Tunnel established"
    );

    let (mut outbound_reader, mut outbound_writer) = tokio::io::split(outbound);
    let (upstream, downstream) = tokio::join!(
        pump(&mut client_reader, &mut outbound_writer, &ctx.cancel),
        pump(&mut outbound_reader, client_writer, &ctx.cancel),
    );
    safe_close(&mut outbound_writer).await;

    // Either direction ending is the normal way a tunnel closes.
    tracing::debug!(
        connection_id = %ctx.id,
        upstream = ?upstream,
        downstream = ?downstream,
        "Tunnel closed"
    );
    Ok(())
}

/// Copy `from` into `to` until EOF, error, or cancellation; then cancel the sibling.
async fn pump<Rd, Wr>(from: &mut Rd, to: &mut Wr, cancel: &CancellationToken) -> io::Result<Option<u64>>
where
    Rd: AsyncRead + Unpin + ?Sized,
    Wr: AsyncWrite + Unpin + ?Sized,
{
    let result = tokio::select! {
        copied = tokio::io::copy(from, to) => copied.map(Some),
        _ = cancel.cancelled() => Ok(None),
    };
    cancel.cancel();
    result
}
