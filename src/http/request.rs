//! Raw HTTP/1.1 request parsing.
//!
//! # Responsibilities
//! - Read the request head straight off the client transport
//! - Resolve the target (`host:port` for CONNECT, absolute URL otherwise)
//! - Frame a POST body by `Content-Length` or hand it to the chunk decoder
//!
//! # Design Decisions
//! - The head must arrive in the first read; bytes after CRLFCRLF in that
//!   read are the start of the body
//! - Header lines split on `": "` and keep only the piece before the next
//!   `": "`, the same way the request head has always been read here
//! - Only POST bodies are framed; other methods forward without a body

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::ProxyError;
use crate::http::chunked::ChunkDecoder;
use crate::http::headers::Headers;

/// Capacity of the single read that must carry the request head.
const HEAD_READ_CAPACITY: usize = 64 * 1024;

/// Capacity reserved per read while accumulating a fixed-length body.
const BODY_READ_RESERVE: usize = 16 * 1024;

/// Port assumed when an absolute URL does not carry one.
const DEFAULT_PORT: u16 = 80;

/// Where the request is headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub hostname: String,
    pub port: u16,
    /// Absolute-form URL for non-CONNECT requests.
    pub url: Option<Url>,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.hostname.contains(':') {
            write!(f, "[{}]:{}", self.hostname, self.port)
        } else {
            write!(f, "{}:{}", self.hostname, self.port)
        }
    }
}

/// Request body as framed by the client.
#[derive(Debug)]
pub enum Body<R> {
    /// `Content-Length` framing, fully read.
    Full(Bytes),
    /// `Transfer-Encoding: chunked`, decoded lazily as it is forwarded.
    Chunked(ChunkDecoder<R>),
}

/// One parsed client request.
#[derive(Debug)]
pub struct Request<R> {
    pub method: String,
    pub target: Target,
    pub headers: Headers,
    pub body: Option<Body<R>>,
    /// The client reader when the body did not take ownership of it.
    reader: Option<R>,
}

impl<R> Request<R> {
    pub fn is_connect(&self) -> bool {
        self.method == "CONNECT"
    }

    /// Hand back the client reader, e.g. to pump a tunnel.
    ///
    /// `None` once a chunked body owns the reader.
    pub fn take_reader(&mut self) -> Option<R> {
        self.reader.take()
    }
}

/// Reads exactly one request from a client connection.
pub struct RequestParser<R> {
    reader: R,
    cancel: CancellationToken,
}

impl<R> RequestParser<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            cancel: CancellationToken::new(),
        }
    }

    /// Token handed to a chunked body so the connection can stop it.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Parse the request, or `Ok(None)` when the peer closed before sending anything.
    pub async fn parse(mut self) -> Result<Option<Request<R>>, ProxyError> {
        let mut first = BytesMut::with_capacity(HEAD_READ_CAPACITY);
        if self.reader.read_buf(&mut first).await? == 0 {
            return Ok(None);
        }

        let (head, leftover) = split_head(first);
        let head = String::from_utf8_lossy(&head);
        let mut lines = head.trim_end().split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split(' ');
        let method = parts.next().unwrap_or_default().to_string();
        let raw_target = parts
            .next()
            .ok_or_else(|| ProxyError::Parse(format!("request line {:?} has no target", request_line)))?;
        if method.is_empty() {
            return Err(ProxyError::Parse("empty request line".into()));
        }

        let mut headers = Headers::new();
        for line in lines {
            let mut pieces = line.split(": ");
            let name = pieces.next().unwrap_or_default();
            let value = pieces
                .next()
                .ok_or_else(|| ProxyError::Parse(format!("header line {:?} has no \": \"", line)))?;
            headers.append(name, value)?;
        }

        if method == "CONNECT" {
            return Ok(Some(Request {
                method,
                target: authority_target(raw_target)?,
                headers,
                body: None,
                reader: Some(self.reader),
            }));
        }

        let target = absolute_target(raw_target)?;
        let mut request = Request {
            method,
            target,
            headers,
            body: None,
            reader: None,
        };

        if request.method != "POST" {
            request.reader = Some(self.reader);
            return Ok(Some(request));
        }

        if let Some(length) = request.headers.get("Content-Length") {
            let expected = length
                .trim()
                .parse::<usize>()
                .map_err(|_| ProxyError::Parse(format!("invalid Content-Length {:?}", length)))?;
            let body = read_exact_body(&mut self.reader, leftover, expected).await?;
            request.body = Some(Body::Full(body));
            request.reader = Some(self.reader);
        } else if let Some(encoding) = request.headers.get("Transfer-Encoding") {
            if !encoding.trim().eq_ignore_ascii_case("chunked") {
                return Err(ProxyError::UnsupportedEncoding(encoding.to_string()));
            }
            let decoder = ChunkDecoder::new(leftover, self.reader).with_cancellation(self.cancel);
            request.body = Some(Body::Chunked(decoder));
        } else {
            request.reader = Some(self.reader);
        }

        Ok(Some(request))
    }
}

/// Split the first read at CRLFCRLF. Without a terminator the whole read is head.
fn split_head(mut first: BytesMut) -> (BytesMut, BytesMut) {
    match first.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(end) => {
            let head = first.split_to(end);
            let _terminator = first.split_to(4);
            (head, first)
        }
        None => (first, BytesMut::new()),
    }
}

/// CONNECT targets are authority-form: `host:port`, no scheme.
fn authority_target(raw: &str) -> Result<Target, ProxyError> {
    let url = Url::parse(&format!("connect://{}", raw))
        .map_err(|e| ProxyError::Parse(format!("invalid CONNECT target {:?}: {}", raw, e)))?;
    let hostname = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProxyError::Parse(format!("CONNECT target {:?} has no host", raw)))?;
    let port = url
        .port()
        .ok_or_else(|| ProxyError::Parse(format!("CONNECT target {:?} has no port", raw)))?;

    Ok(Target {
        hostname: strip_brackets(hostname).to_string(),
        port,
        url: None,
    })
}

fn absolute_target(raw: &str) -> Result<Target, ProxyError> {
    let url = Url::parse(raw).map_err(|e| ProxyError::Parse(format!("invalid target {:?}: {}", raw, e)))?;
    let hostname = url
        .host_str()
        .ok_or_else(|| ProxyError::Parse(format!("target {:?} has no host", raw)))?;

    Ok(Target {
        hostname: strip_brackets(hostname).to_string(),
        port: url.port().unwrap_or(DEFAULT_PORT),
        url: Some(url.clone()),
    })
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

async fn read_exact_body<R>(reader: &mut R, leftover: BytesMut, expected: usize) -> Result<Bytes, ProxyError>
where
    R: AsyncRead + Unpin,
{
    let mut body = leftover;
    while body.len() < expected {
        body.reserve(BODY_READ_RESERVE.min(expected - body.len()));
        if reader.read_buf(&mut body).await? == 0 {
            return Err(ProxyError::IncompleteBody {
                expected,
                received: body.len(),
            });
        }
    }
    body.truncate(expected);
    Ok(body.freeze())
}
