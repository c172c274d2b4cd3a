//! Plain HTTP forwarding.
//!
//! The parsed request is reissued to the origin with the proxy credentials
//! stripped, and the origin's response is written back as a reconstructed
//! HTTP/1.1 head followed by the decoded body bytes. Redirects are relayed,
//! never followed.

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use hyper::Method;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::ProxyError;
use crate::http::request::{Body, Request};
use crate::http::response::response_head;
use crate::proxy::handler::ConnectionContext;
use crate::resilience::timeouts;
use crate::security::auth::PROXY_AUTHORIZATION;

/// Body type of outbound requests.
pub type UpstreamBody = UnsyncBoxBody<Bytes, ProxyError>;

/// Outbound HTTP/1.1 client.
pub type UpstreamClient = Client<HttpConnector, UpstreamBody>;

/// Build the outbound client.
///
/// Pooling is off: every outbound connection belongs to exactly one client
/// connection and closes with it.
pub fn upstream_client() -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(0)
        .build(connector)
}

/// Forward `request` and stream the response into `client_writer`.
pub async fn run<R, W>(
    mut request: Request<R>,
    client_writer: &mut W,
    client: &UpstreamClient,
    ctx: &ConnectionContext,
) -> Result<(), ProxyError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    request.headers.remove(PROXY_AUTHORIZATION);
    let target = request.target.to_string();
    let outbound = outbound_request(request)?;

    let response = timeouts::request(client.request(outbound), ctx.deadline, &ctx.cancel).await?;

    tracing::info!(
        connection_id = %ctx.id,
        source = %ctx.peer,
        destination = %target,
        status = response.status().as_u16(),
        "Proxy response"
    );

    let reason = response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| reason.as_bytes());
    let head = response_head(response.status(), reason, response.headers());
    client_writer.write_all(&head).await?;
    client_writer.flush().await?;

    let mut body = response.into_body();
    loop {
        let frame = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ProxyError::Cancelled),
            frame = body.frame() => frame,
        };
        let frame = match frame {
            None => break,
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                ctx.cancel.cancel();
                return Err(e.into());
            }
        };
        // Trailers are dropped; the head has already gone out.
        if let Ok(data) = frame.into_data() {
            let written = async {
                client_writer.write_all(&data).await?;
                client_writer.flush().await
            };
            if let Err(e) = written.await {
                ctx.cancel.cancel();
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Translate the parsed request into an outbound hyper request.
fn outbound_request<R>(request: Request<R>) -> Result<hyper::Request<UpstreamBody>, ProxyError>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Request {
        method,
        target,
        headers,
        body,
        ..
    } = request;

    let url = target
        .url
        .ok_or_else(|| ProxyError::Parse("request has no absolute URL".into()))?;
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| ProxyError::Parse(format!("invalid method {:?}", method)))?;

    let mut builder = hyper::Request::builder().method(method).uri(url.as_str());
    for (name, value) in headers.iter() {
        // Without a body, stale framing headers would make the origin wait for one.
        if body.is_none()
            && (name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
                || name.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str()))
        {
            continue;
        }
        builder = builder.header(name, value);
    }

    let body = match body {
        None => Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync(),
        Some(Body::Full(bytes)) => Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
        Some(Body::Chunked(decoder)) => StreamBody::new(decoder.into_stream().map_ok(Frame::data)).boxed_unsync(),
    };

    builder
        .body(body)
        .map_err(|e| ProxyError::Parse(format!("cannot build outbound request: {}", e)))
}
