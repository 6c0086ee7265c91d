//! Error types for node loading, address resolution, probing and emission.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The node list could not be read or parsed. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read node list {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed node list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The public address service could not be reached. Fatal at startup.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("public address lookup against {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Lifecycle phase of a probe, used to attribute timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Name resolution plus TCP connect (the dialer budget).
    Connect,
    TlsHandshake,
    /// The whole request, from the first DNS query to the decoded body.
    Request,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Connect => write!(f, "connect"),
            Phase::TlsHandshake => write!(f, "tls handshake"),
            Phase::Request => write!(f, "request"),
        }
    }
}

/// A single probe failed. Contained within one cycle.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe target: {0}")]
    InvalidTarget(String),

    #[error("DNS resolution for {host} failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("{phase} timed out after {budget:?}")]
    Timeout { phase: Phase, budget: Duration },

    #[error("HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("HTTP status code: {0}")]
    BadStatus(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ProbeError {
    /// True for failures where the target never answered at the HTTP level.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ProbeError::Dns { .. } | ProbeError::Connect { .. } | ProbeError::Timeout { .. }
        )
    }
}

/// The telemetry sink rejected a record. Reported, never retried.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink write failed: {0}")]
    Io(#[from] io::Error),

    #[error("sink is closed")]
    Closed,
}
