//! Connection setup and the HTTP/1.1 exchange, each step marking the clock.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Limited};
use hyper::Request;
use hyper::header::{ACCEPT, HOST, USER_AGENT};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, lookup_host};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;
use url::{Host, Url};

use super::timings::{PhaseClock, TraceEvent};
use crate::error::ProbeError;

/// Status bodies are a few hundred bytes; anything far beyond is not a node.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Where a probe connects, extracted from its URL.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    host: TargetHost,
    port: u16,
    secure: bool,
}

#[derive(Debug, Clone)]
enum TargetHost {
    Ip(IpAddr),
    Domain(String),
}

impl Target {
    pub(crate) fn from_url(url: &Url) -> Result<Self, ProbeError> {
        let secure = match url.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(ProbeError::InvalidTarget(format!("unsupported scheme {other}"))),
        };
        let host = match url.host() {
            Some(Host::Ipv4(ip)) => TargetHost::Ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => TargetHost::Ip(IpAddr::V6(ip)),
            Some(Host::Domain(domain)) => TargetHost::Domain(domain.to_string()),
            None => return Err(ProbeError::InvalidTarget(format!("{url} has no host"))),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ProbeError::InvalidTarget(format!("{url} has no port")))?;

        Ok(Self { host, port, secure })
    }

    pub(crate) fn is_secure(&self) -> bool {
        self.secure
    }

    fn host_name(&self) -> String {
        match &self.host {
            TargetHost::Ip(ip) => ip.to_string(),
            TargetHost::Domain(domain) => domain.clone(),
        }
    }
}

/// Resolve the target. IP literals skip the lookup and leave DNS at zero.
pub(crate) async fn resolve(
    target: &Target,
    clock: &mut PhaseClock,
) -> Result<Vec<SocketAddr>, ProbeError> {
    let domain = match &target.host {
        TargetHost::Ip(ip) => return Ok(vec![SocketAddr::new(*ip, target.port)]),
        TargetHost::Domain(domain) => domain,
    };

    clock.mark(TraceEvent::DnsStart);
    let lookup = lookup_host((domain.as_str(), target.port)).await;
    clock.mark(TraceEvent::DnsDone);

    let addrs: Vec<SocketAddr> = lookup
        .map_err(|source| ProbeError::Dns { host: domain.clone(), source })?
        .collect();
    if addrs.is_empty() {
        return Err(ProbeError::Dns {
            host: domain.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
        });
    }
    Ok(addrs)
}

/// Connect to the first address that accepts.
pub(crate) async fn connect(
    addrs: &[SocketAddr],
    clock: &mut PhaseClock,
) -> Result<TcpStream, ProbeError> {
    let mut last_error = None;

    for addr in addrs {
        clock.mark(TraceEvent::ConnectStart);
        let attempt = TcpStream::connect(addr).await;
        clock.mark(TraceEvent::ConnectDone);

        match attempt {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(source) => {
                debug!(%addr, error = %source, "connect attempt failed");
                last_error = Some(ProbeError::Connect { addr: addr.to_string(), source });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ProbeError::InvalidTarget("no address to connect to".into())))
}

/// Client TLS configuration trusting the webpki root set.
pub(crate) fn default_tls_config() -> Result<Arc<rustls::ClientConfig>, ProbeError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ProbeError::Tls(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(Arc::new(config))
}

pub(crate) async fn tls_handshake(
    connector: &TlsConnector,
    target: &Target,
    stream: TcpStream,
    clock: &mut PhaseClock,
) -> Result<TlsStream<TcpStream>, ProbeError> {
    let server_name = match &target.host {
        TargetHost::Ip(ip) => ServerName::from(*ip),
        TargetHost::Domain(domain) => ServerName::try_from(domain.clone())
            .map_err(|e| ProbeError::Tls(format!("invalid server name {domain}: {e}")))?,
    };

    clock.mark(TraceEvent::TlsHandshakeStart);
    let handshake = connector.connect(server_name, stream).await;
    clock.mark(TraceEvent::TlsHandshakeDone);

    handshake.map_err(|e| ProbeError::Tls(e.to_string()))
}

/// Aborts the connection driver when the exchange ends or is dropped,
/// closing the socket.
struct ConnectionTask(JoinHandle<()>);

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Send the GET over an established connection and return the body of a
/// successful response. Marks `GotConn` and `GotFirstResponseByte`.
pub(crate) async fn exchange<S>(
    stream: S,
    url: &Url,
    target: &Target,
    clock: &mut PhaseClock,
) -> Result<Bytes, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    clock.mark(TraceEvent::GotConn);

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    let _driver = ConnectionTask(tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(error = %e, "probe connection closed with error");
        }
    }));

    let request = build_request(url, target)?;
    let response = sender.send_request(request).await?;
    clock.mark(TraceEvent::GotFirstResponseByte);

    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::BadStatus(status.as_u16()));
    }

    let body = Limited::new(response.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| ProbeError::Body(e.to_string()))?
        .to_bytes();
    Ok(body)
}

fn build_request(url: &Url, target: &Target) -> Result<Request<Empty<Bytes>>, ProbeError> {
    let host = url.host_str().unwrap_or_default();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };

    debug!(host = %target.host_name(), port = target.port, %path, "sending probe request");

    Request::get(path)
        .header(HOST, authority)
        .header(USER_AGENT, concat!("nodebeat/", env!("CARGO_PKG_VERSION")))
        .header(ACCEPT, "application/json")
        .body(Empty::<Bytes>::new())
        .map_err(|e| ProbeError::InvalidTarget(e.to_string()))
}
