//! Proxy authentication.
//!
//! One handler per policy kind. A failed check writes the `407` challenge to
//! the client before returning, and the caller closes the connection: there
//! is no second attempt on the same connection.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::ProxyError;
use crate::http::headers::Headers;
use crate::http::response::proxy_auth_required;

/// Header carrying the client's proxy credentials.
pub const PROXY_AUTHORIZATION: &str = "Proxy-Authorization";

/// How clients must authenticate to the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthPolicy {
    /// Every client passes.
    #[default]
    None,
    /// `Proxy-Authorization: Basic base64(username:password)`.
    Basic {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },
}

impl AuthPolicy {
    /// Scheme name advertised in `Proxy-Authenticate`.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthPolicy::None => "none",
            AuthPolicy::Basic { .. } => "basic",
        }
    }
}

/// Check `headers` against `policy`, answering `respond_to` with a 407 on failure.
pub async fn authenticate<W>(headers: &Headers, policy: &AuthPolicy, respond_to: &mut W) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    let outcome = match policy {
        AuthPolicy::None => return Ok(()),
        AuthPolicy::Basic { username, password } => match headers.get(PROXY_AUTHORIZATION) {
            None => Err(format!("No '{}' header", PROXY_AUTHORIZATION)),
            Some(credentials) => check_basic(credentials, username, password),
        },
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(reason) => {
            respond_to.write_all(&proxy_auth_required(policy.kind())).await?;
            respond_to.flush().await?;
            Err(ProxyError::AuthFailed(reason))
        }
    }
}

/// Validate a basic credentials header value against the configured pair.
fn check_basic(header: &str, username: &str, password: &str) -> Result<(), String> {
    let encoded = header
        .split(' ')
        .nth(1)
        .ok_or_else(|| format!("'{}' header has no credentials", PROXY_AUTHORIZATION))?;
    let decoded = STANDARD.decode(encoded).map_err(|e| e.to_string())?;
    let decoded = String::from_utf8_lossy(&decoded);

    // The password never reaches the error message; it ends up in logs.
    match decoded.split_once(':') {
        Some((user, pass)) if user == username && pass == password => Ok(()),
        Some((user, _)) => Err(format!("credentials for {:?} mismatch", user)),
        None => Err("credentials have no ':'".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(username: &str, password: &str) -> AuthPolicy {
        AuthPolicy::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    fn headers_with(value: Option<&str>) -> Headers {
        let mut headers = Headers::new();
        headers.append("Host", "example.com").unwrap();
        if let Some(value) = value {
            headers.append(PROXY_AUTHORIZATION, value).unwrap();
        }
        headers
    }

    fn encode(credentials: &str) -> String {
        format!("Basic {}", STANDARD.encode(credentials))
    }

    const CHALLENGE: &[u8] = b"HTTP/1.1 407 Proxy Authentication Required\r\nProxy-Authenticate: basic\r\n\r\n";

    #[tokio::test]
    async fn none_always_passes() {
        let mut out = Vec::new();
        for value in [None, Some("Basic garbage"), Some("")] {
            authenticate(&headers_with(value), &AuthPolicy::None, &mut out).await.unwrap();
        }
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn basic_accepts_matching_credentials() {
        let mut out = Vec::new();
        let headers = headers_with(Some(&encode("u:p")));
        authenticate(&headers, &basic("u", "p"), &mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn password_may_contain_colons() {
        let mut out = Vec::new();
        let headers = headers_with(Some(&encode("u:p:q")));
        authenticate(&headers, &basic("u", "p:q"), &mut out).await.unwrap();
    }

    #[tokio::test]
    async fn missing_header_gets_one_challenge() {
        let mut out = Vec::new();
        let err = authenticate(&headers_with(None), &basic("u", "p"), &mut out).await.unwrap_err();

        assert!(matches!(err, ProxyError::AuthFailed(ref msg) if msg.contains("Proxy-Authorization")));
        assert_eq!(out, CHALLENGE);
    }

    #[tokio::test]
    async fn mismatch_names_user_only() {
        let mut out = Vec::new();
        let headers = headers_with(Some(&encode("u:wrong")));
        let err = authenticate(&headers, &basic("u", "p"), &mut out).await.unwrap_err();

        assert!(matches!(err, ProxyError::AuthFailed(ref msg) if msg == "credentials for \"u\" mismatch"));
        assert_eq!(out, CHALLENGE);
    }

    #[tokio::test]
    async fn undecodable_credentials_fail() {
        let mut out = Vec::new();
        for value in ["Basic !!!not-base64!!!", "Basic", "dTpw"] {
            out.clear();
            let result = authenticate(&headers_with(Some(value)), &basic("u", "p"), &mut out).await;
            assert!(matches!(result, Err(ProxyError::AuthFailed(_))), "{value} should fail");
            assert_eq!(out, CHALLENGE);
        }
    }

    #[test]
    fn policy_deserializes_from_tagged_table() {
        let policy: AuthPolicy = toml::from_str("type = \"basic\"\nusername = \"u\"\npassword = \"p\"").unwrap();
        assert_eq!(policy, basic("u", "p"));
        assert_eq!(policy.kind(), "basic");

        let policy: AuthPolicy = toml::from_str("type = \"none\"").unwrap();
        assert_eq!(policy, AuthPolicy::None);
    }
}
