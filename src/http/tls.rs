use crate::http::timing::TraceHook;
use anyhow::Context;
use rustls::crypto::ring::{default_provider, DEFAULT_CIPHER_SUITES};
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// The bundled webpki trust anchors.
pub fn webpki_roots() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    root_store
}

/// Client config trusting `root_store` and speaking HTTP/1.1 only.
pub fn client_config(root_store: RootCertStore) -> Result<ClientConfig, anyhow::Error> {
    let provider = Arc::new(rustls::crypto::CryptoProvider {
        cipher_suites: DEFAULT_CIPHER_SUITES.to_vec(),
        ..default_provider()
    });

    let mut tls_config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(tls_config)
}

pub async fn handshake(
    stream: TcpStream,
    host: &str,
    tls_config: Arc<ClientConfig>,
    hook: &dyn TraceHook,
) -> Result<TlsStream<TcpStream>, anyhow::Error> {
    let domain = pki_types::ServerName::try_from(host)
        .map_err(|e| anyhow!("invalid server name {}: {}", host, e))?
        .to_owned();
    let connector = TlsConnector::from(tls_config);

    hook.on_tls_start();
    let tls_stream = connector
        .connect(domain, stream)
        .await
        .with_context(|| format!("TLS handshake with {} failed", host))?;
    hook.on_tls_done();

    if let Some(protocol) = tls_stream.get_ref().1.protocol_version() {
        debug!("TLS established with {}: {:?}", host, protocol);
    }
    Ok(tls_stream)
}
