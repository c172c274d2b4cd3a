//! TLS configuration and certificate loading.

use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use tokio_rustls::TlsAcceptor;

/// The only application protocol spoken on TLS listeners.
const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Load a TLS acceptor from PEM certificate and key files.
pub async fn load_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, std::io::Error> {
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;

    // The loader advertises h2 as well; requests are parsed as HTTP/1.1 only.
    let mut server_config = (*config.get_inner()).clone();
    server_config.alpn_protocols = vec![ALPN_HTTP11.to_vec()];

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
