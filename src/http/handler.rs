use crate::http::resolver::{bare_host, resolve};
use crate::http::timed_io::TimedStream;
use crate::http::timing::{PhaseRecorder, PhaseTimings, TraceHook};
use crate::http::tls;
use anyhow::{anyhow, Context};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderValue, CONTENT_LENGTH, HOST, USER_AGENT};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use rustls::RootCertStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::Instrument;
use url::Url;

/// What goes on the wire for the `-body` flag. The flag's text itself is never
/// sent: any non-empty value produces a zero-length payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestBody {
    Absent,
    Empty,
}

impl RequestBody {
    pub fn from_flag(body: Option<&str>) -> Self {
        match body {
            Some(b) if !b.is_empty() => RequestBody::Empty,
            _ => RequestBody::Absent,
        }
    }
}

/// Outcome of one timed round trip.
#[derive(Debug)]
pub struct RequestStat {
    pub status: StatusCode,
    pub body_bytes: u64,
    pub phases: PhaseTimings,
    pub started_at: DateTime<Utc>,
}

/// Aborts the task driving the connection when dropped, closing the socket.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Validates the target and builds the request, still carrying the absolute URI.
///
/// The URL goes through `url::Url` first so international hosts become
/// punycode and non-ASCII paths get percent-encoded before `http::Uri` sees them.
pub fn build_request(
    url: &str,
    method: &str,
    body: RequestBody,
) -> Result<Request<Empty<Bytes>>, anyhow::Error> {
    let mut target: Url = url
        .parse()
        .with_context(|| format!("parse {:?}: invalid URL", url))?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(anyhow!("unsupported protocol scheme {:?}", target.scheme()));
    }
    target.set_fragment(None);
    let host = target
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| anyhow!("no Host in request URL {:?}", url))?;
    let host_header = match target.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let uri: Uri = target
        .as_str()
        .parse()
        .with_context(|| format!("parse {:?}: invalid URL", url))?;

    let method = if method.is_empty() { "GET" } else { method };
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| anyhow!("net/http: invalid method {:?}", method))?;
    // methods that normally carry a body always announce its length
    let announce_length = body == RequestBody::Empty
        || method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH;

    let mut request_builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(HOST, HeaderValue::from_str(&host_header)?)
        .header(
            USER_AGENT,
            HeaderValue::from_static(concat!(
                "mackerel-plugin-httpstat/",
                env!("CARGO_PKG_VERSION")
            )),
        );
    if announce_length {
        request_builder = request_builder.header(CONTENT_LENGTH, HeaderValue::from_static("0"));
    }

    let request = request_builder.body(Empty::<Bytes>::new())?;
    Ok(request)
}

/// Sends `request` over a fresh connection, drains the response body and
/// returns the per-phase timings. `root_store` is only consulted for https.
pub async fn send_request(
    mut request: Request<Empty<Bytes>>,
    root_store: RootCertStore,
) -> Result<RequestStat, anyhow::Error> {
    let uri = request.uri().clone();
    let https = uri.scheme_str() == Some("https");
    let host = uri
        .host()
        .ok_or_else(|| anyhow!("no Host in request URL"))?
        .to_string();
    let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });
    *request.uri_mut() = origin_form(&uri)?;

    debug!(
        "> {} {} {:?}",
        request.method(),
        request.uri(),
        request.version()
    );
    for (key, value) in request.headers().iter() {
        debug!("> {}: {}", key, value.to_str().unwrap_or("<binary>"));
    }

    let recorder = Arc::new(PhaseRecorder::new());
    let hook: Arc<dyn TraceHook> = recorder.clone();

    let started_at = Utc::now();
    let addrs = resolve(&host, port, hook.as_ref()).await?;
    let stream = connect(&addrs, hook.as_ref()).await?;
    let remote_addr = stream.peer_addr()?;
    let (response, connection) = if https {
        let tls_config = Arc::new(tls::client_config(root_store)?);
        let tls_stream =
            tls::handshake(stream, bare_host(&host), tls_config, hook.as_ref()).await?;
        exchange(tls_stream, remote_addr, request, hook.clone()).await?
    } else {
        exchange(stream, remote_addr, request, hook.clone()).await?
    };

    debug!("< {:?} {}", response.version(), response.status());
    for (key, value) in response.headers().iter() {
        debug!("< {}: {}", key, value.to_str().unwrap_or("<binary>"));
    }

    let status = response.status();
    let body_bytes = drain_body(response).await?;
    let ended_at = Instant::now();
    drop(connection);

    let phases = recorder.snapshot().phases(ended_at);
    debug!("{}", phases);

    Ok(RequestStat {
        status,
        body_bytes,
        phases,
        started_at,
    })
}

fn origin_form(uri: &Uri) -> Result<Uri, anyhow::Error> {
    let path = match uri.path() {
        "" => "/",
        p => p,
    };
    let target = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    target
        .parse()
        .with_context(|| format!("invalid request target {:?}", target))
}

async fn connect(addrs: &[SocketAddr], hook: &dyn TraceHook) -> Result<TcpStream, anyhow::Error> {
    let mut last_error = None;
    for addr in addrs {
        hook.on_connect_start();
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                hook.on_connect_done();
                debug!("Connected to {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(anyhow::Error::new(e).context(format!("dial tcp {}", addr)));
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("no address to connect to")))
}

async fn exchange<S>(
    stream: S,
    remote_addr: SocketAddr,
    request: Request<Empty<Bytes>>,
    hook: Arc<dyn TraceHook>,
) -> Result<(Response<Incoming>, ConnectionGuard), anyhow::Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let stream_io = TokioIo::new(TimedStream::new(stream, hook));
    let (mut sender, conn) = http1::handshake(stream_io)
        .await
        .context("HTTP handshake failed")?;
    let connection = ConnectionGuard(tokio::task::spawn(
        async move {
            if let Err(err) = conn.await {
                debug!("Connection failed: {:?}", err);
            }
        }
        .instrument(info_span!("conn", remoteAddr = %remote_addr)),
    ));

    let response = sender
        .send_request(request)
        .await
        .context("Failed to execute request")?;
    Ok((response, connection))
}

async fn drain_body(response: Response<Incoming>) -> Result<u64, anyhow::Error> {
    let mut body = response.into_body();
    let mut total = 0u64;
    while let Some(frame) = body.frame().await {
        let frame = frame.context("Error while reading response body")?;
        if let Ok(data) = frame.into_data() {
            total += data.len() as u64;
        }
    }
    Ok(total)
}
