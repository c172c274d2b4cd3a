//! Chunked transfer-encoding decoder.
//!
//! Turns a `Transfer-Encoding: chunked` request body into a lazy sequence of
//! unframed segments. The decoder is single-pass: once it reaches the
//! zero-size chunk or fails, it yields nothing further.
//!
//! ```text
//! AwaitingSize ──(size > 0)──▶ AwaitingFullChunk ──(emit)──▶ AwaitingSize
//!      │                              │
//!      └──(size == 0)──▶ Complete     └──(EOF)──▶ Errored
//! ```

use bytes::{Buf, Bytes, BytesMut};
use futures_util::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;

/// Bytes reserved in the pending buffer before each read.
const READ_RESERVE: usize = 8 * 1024;

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPhase {
    /// Waiting for a full `<hex-size>\r\n` line.
    AwaitingSize,
    /// Waiting for `size` data bytes plus the trailing CRLF.
    AwaitingFullChunk(usize),
    /// The zero-size chunk was seen.
    Complete,
    /// The source ended early or sent an invalid size line.
    Errored,
}

/// Lazily reframes chunk-encoded bytes read from `R`.
#[derive(Debug)]
pub struct ChunkDecoder<R> {
    reader: R,
    pending: BytesMut,
    phase: ChunkPhase,
    cancel: CancellationToken,
}

impl<R> ChunkDecoder<R>
where
    R: AsyncRead + Unpin,
{
    /// Start decoding from the bytes already read past the header block,
    /// continuing with `reader` once they run out.
    pub fn new(leftover: BytesMut, reader: R) -> Self {
        Self {
            reader,
            pending: leftover,
            phase: ChunkPhase::AwaitingSize,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop suspended reads when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn phase(&self) -> ChunkPhase {
        self.phase
    }

    /// Produce the next unframed segment, or `None` once the body is complete.
    pub async fn next_segment(&mut self) -> Result<Option<Bytes>, ProxyError> {
        loop {
            match self.phase {
                ChunkPhase::Complete | ChunkPhase::Errored => return Ok(None),
                ChunkPhase::AwaitingSize => {
                    let Some(line_end) = find_crlf(&self.pending) else {
                        self.fill().await?;
                        continue;
                    };
                    let size = match parse_size(&self.pending[..line_end]) {
                        Ok(size) => size,
                        Err(e) => {
                            self.phase = ChunkPhase::Errored;
                            return Err(e);
                        }
                    };
                    self.pending.advance(line_end + 2);

                    if size == 0 {
                        self.phase = ChunkPhase::Complete;
                        return Ok(None);
                    }
                    self.phase = ChunkPhase::AwaitingFullChunk(size);
                }
                ChunkPhase::AwaitingFullChunk(size) => {
                    // size + CRLF; parse_size already bounded size below usize::MAX - 2.
                    if self.pending.len() < size + 2 {
                        self.fill().await?;
                        continue;
                    }
                    let segment = self.pending.split_to(size).freeze();
                    self.pending.advance(2);
                    self.phase = ChunkPhase::AwaitingSize;
                    return Ok(Some(segment));
                }
            }
        }
    }

    /// Adapt the decoder into a `Stream` suitable for an outbound request body.
    ///
    /// A failure is yielded once, after which the stream ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, ProxyError>> + Send
    where
        R: Send + 'static,
    {
        futures_util::stream::unfold(self, |mut decoder| async move {
            match decoder.next_segment().await {
                Ok(Some(segment)) => Some((Ok(segment), decoder)),
                Ok(None) => None,
                Err(e) => Some((Err(e), decoder)),
            }
        })
    }

    async fn fill(&mut self) -> Result<(), ProxyError> {
        self.pending.reserve(READ_RESERVE);
        let read = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProxyError::Cancelled),
            read = self.reader.read_buf(&mut self.pending) => read.map_err(ProxyError::from),
        };

        match read {
            Ok(0) => {
                self.phase = ChunkPhase::Errored;
                Err(ProxyError::UnexpectedEof)
            }
            Ok(_) => Ok(()),
            Err(e) => {
                self.phase = ChunkPhase::Errored;
                Err(e)
            }
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse a chunk-size line, ignoring any `;extension`.
fn parse_size(line: &[u8]) -> Result<usize, ProxyError> {
    let token = line.split(|&b| b == b';').next().unwrap_or_default();
    let token = std::str::from_utf8(token)
        .map_err(|_| ProxyError::Parse("chunk size is not ASCII".into()))?
        .trim();

    let size = usize::from_str_radix(token, 16)
        .map_err(|_| ProxyError::Parse(format!("invalid chunk size {:?}", token)))?;
    if size > usize::MAX - 2 {
        return Err(ProxyError::Parse(format!("chunk size {:?} too large", token)));
    }
    Ok(size)
}
