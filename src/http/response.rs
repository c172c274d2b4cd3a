//! Response heads written to the client.

use hyper::header::TRANSFER_ENCODING;
use hyper::HeaderMap;
use hyper::StatusCode;

/// Written once the outbound dial for a CONNECT succeeds.
pub const TUNNEL_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";

/// `407` challenge for the given auth kind, e.g. `basic`.
pub fn proxy_auth_required(kind: &str) -> Vec<u8> {
    format!("HTTP/1.1 407 Proxy Authentication Required\r\nProxy-Authenticate: {}\r\n\r\n", kind).into_bytes()
}

/// Rebuild the upstream response head for the client.
///
/// The status line is always HTTP/1.1. Every header is copied except
/// `transfer-encoding`, since the body is relayed already decoded.
pub fn response_head(status: StatusCode, reason: Option<&[u8]>, headers: &HeaderMap) -> Vec<u8> {
    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(format!("HTTP/1.1 {} ", status.as_u16()).as_bytes());
    match reason {
        Some(reason) => head.extend_from_slice(reason),
        None => head.extend_from_slice(status.canonical_reason().unwrap_or_default().as_bytes()),
    }

    for (name, value) in headers {
        if *name == TRANSFER_ENCODING {
            continue;
        }
        head.extend_from_slice(b"\r\n");
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
    }
    head.extend_from_slice(b"\r\n\r\n");
    head
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};

    #[test]
    fn challenge_names_the_kind() {
        assert_eq!(
            proxy_auth_required("basic"),
            b"HTTP/1.1 407 Proxy Authentication Required\r\nProxy-Authenticate: basic\r\n\r\n"
        );
    }

    #[test]
    fn head_drops_transfer_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        let head = String::from_utf8(response_head(StatusCode::OK, None, &headers)).unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("\r\ncontent-type: text/plain"));
        assert!(head.contains("\r\nset-cookie: a=1\r\nset-cookie: b=2"));
        assert!(!head.contains("transfer-encoding"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn head_prefers_upstream_reason() {
        let head = response_head(StatusCode::NOT_FOUND, Some(b"Nothing Here"), &HeaderMap::new());
        assert_eq!(head, b"HTTP/1.1 404 Nothing Here\r\n\r\n");
    }
}
