use rustls::crypto::ring::default_provider;
use rustls::{RootCertStore, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

const CA_PEM: &[u8] = include_bytes!("http/testdata/ca.pem");
const LOCALHOST_PEM: &[u8] = include_bytes!("http/testdata/localhost.pem");
const LOCALHOST_KEY: &[u8] = include_bytes!("http/testdata/localhost.key");

/// Accepts a single connection, waits `delay` after the request head arrived,
/// answers `200 OK` with `body` and hands back the raw request head.
pub async fn serve_once(delay: Duration, body: &'static str) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        answer(socket, delay, body).await
    });
    (addr, handle)
}

/// Same as [`serve_once`] behind TLS, presenting the `localhost` test
/// certificate. A failed handshake yields an empty request head.
pub async fn serve_once_tls(
    delay: Duration,
    body: &'static str,
) -> (SocketAddr, JoinHandle<String>) {
    let acceptor = TlsAcceptor::from(Arc::new(server_config()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        match acceptor.accept(socket).await {
            Ok(tls_stream) => answer(tls_stream, delay, body).await,
            Err(_) => String::new(),
        }
    });
    (addr, handle)
}

/// Trust store holding only the CA that signed the test certificate.
pub fn test_roots() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut &CA_PEM[..]) {
        root_store.add(cert.unwrap()).unwrap();
    }
    root_store
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn server_config() -> ServerConfig {
    let certs = rustls_pemfile::certs(&mut &LOCALHOST_PEM[..])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut &LOCALHOST_KEY[..])
        .unwrap()
        .unwrap();
    let mut config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    config
}

async fn answer<S>(mut socket: S, delay: Duration, body: &'static str) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        raw.extend_from_slice(&buf[..n]);
    }
    tokio::time::sleep(delay).await;
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
    String::from_utf8_lossy(&raw).into_owned()
}
