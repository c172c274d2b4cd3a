//! HTTP/1.1 framing read straight off the client transport.
//!
//! # Data Flow
//! ```text
//! client bytes
//!     → request.rs (request line, headers, target, body framing)
//!     → chunked.rs (lazy decoding of chunked POST bodies)
//!     → headers.rs (ordered, case-insensitive header list)
//!     → [security::auth, proxy::handler]
//!     → response.rs (407 challenge, tunnel line, proxied response head)
//! ```

pub mod chunked;
pub mod headers;
pub mod request;
pub mod response;

pub use chunked::{ChunkDecoder, ChunkPhase};
pub use headers::Headers;
pub use request::{Body, Request, RequestParser, Target};
