//! Telemetry records handed to the sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::Endpoint;
use crate::tracer::TraceOutcome;

/// Outcome of the probe a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Up => write!(f, "up"),
            ProbeStatus::Down => write!(f, "down"),
        }
    }
}

/// One emitted event.
///
/// Successful probes fill every timing and health field. Failure records
/// (only produced when enabled) carry `error` instead and leave them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub status: ProbeStatus,
    pub network: String,
    pub target: String,
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_full: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_dns: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_conn: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_resp: Option<f64>,
    /// Only present when the probe negotiated TLS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_tls: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_producer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastirrb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_block_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_block_id: Option<String>,

    pub bp_name: String,
    pub org: String,
    pub location: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TelemetryRecord {
    /// Record for a successful probe.
    pub fn from_probe(
        network: &str,
        source: &str,
        endpoint: &Endpoint,
        outcome: &TraceOutcome,
    ) -> Self {
        let timings = &outcome.timings;
        let payload = &outcome.payload;
        Self {
            latency_full: Some(timings.full),
            latency_dns: Some(timings.dns),
            latency_conn: Some(timings.conn),
            latency_resp: Some(timings.resp),
            latency_tls: outcome.tls.then_some(timings.tls),
            block: Some(payload.head_block_num),
            current_producer: Some(payload.head_block_producer.clone()),
            lastirrb: Some(payload.last_irreversible_block_num),
            server_version: Some(payload.server_version.clone()),
            head_block_time: Some(payload.head_block_time.clone()),
            head_block_id: Some(payload.head_block_id.clone()),
            ..Self::base(ProbeStatus::Up, network, source, endpoint)
        }
    }

    /// Record for a failed probe.
    pub fn failure(network: &str, source: &str, endpoint: &Endpoint, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::base(ProbeStatus::Down, network, source, endpoint)
        }
    }

    fn base(status: ProbeStatus, network: &str, source: &str, endpoint: &Endpoint) -> Self {
        Self {
            timestamp: Utc::now(),
            status,
            network: network.to_string(),
            target: endpoint.host.clone(),
            source: source.to_string(),
            latency_full: None,
            latency_dns: None,
            latency_conn: None,
            latency_resp: None,
            latency_tls: None,
            block: None,
            current_producer: None,
            lastirrb: None,
            server_version: None,
            head_block_time: None,
            head_block_id: None,
            bp_name: endpoint.name.clone(),
            org: endpoint.organisation.clone(),
            location: endpoint.location.clone(),
            error: None,
        }
    }
}
