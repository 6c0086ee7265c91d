//! A single monitored node.

use tracing::warn;
use url::Url;

use super::schema::NodeEntry;
use crate::GET_INFO_PATH;
use crate::error::ProbeError;

/// One monitored target and its running latency history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Endpoint {
    pub name: String,
    pub organisation: String,
    pub location: String,
    pub host: String,
    pub port_http: Option<u16>,
    pub port_ssl: Option<u16>,
    pub port_p2p: Option<u16>,
    /// Latitude and longitude in decimal degrees.
    pub coordinates: Option<(f64, f64)>,
    latencies: Vec<f64>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port_http: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port_http: Some(port_http),
            ..Self::default()
        }
    }

    pub fn with_ssl_port(mut self, port: u16) -> Self {
        self.port_ssl = Some(port);
        self
    }

    pub fn with_metadata(
        mut self,
        organisation: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.organisation = organisation.into();
        self.location = location.into();
        self
    }

    /// Observed round-trip latencies in milliseconds, oldest first.
    pub fn latencies(&self) -> &[f64] {
        &self.latencies
    }

    pub fn record_latency(&mut self, millis: f64) {
        self.latencies.push(millis);
    }

    /// Mean of the latency history, `None` before the first sample.
    pub fn average_latency(&self) -> Option<f64> {
        if self.latencies.is_empty() {
            return None;
        }
        Some(self.latencies.iter().sum::<f64>() / self.latencies.len() as f64)
    }

    /// Plain HTTP status URL: `http://{host}:{port_http}/v1/chain/get_info`.
    ///
    /// Without an HTTP port the scheme default (80) is used.
    pub fn http_url(&self) -> Result<Url, ProbeError> {
        self.build_url("http", self.port_http)
    }

    /// HTTPS status URL on the TLS port, `None` when the node has no TLS port.
    pub fn https_url(&self) -> Option<Result<Url, ProbeError>> {
        self.port_ssl.map(|port| self.build_url("https", Some(port)))
    }

    /// Name used in log lines: the producer name, or the address when unnamed.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.host } else { &self.name }
    }

    fn build_url(&self, scheme: &str, port: Option<u16>) -> Result<Url, ProbeError> {
        if self.host.is_empty() {
            return Err(ProbeError::InvalidTarget(format!("{}: empty node address", self.label())));
        }
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let port = port.map(|port| format!(":{port}")).unwrap_or_default();
        Url::parse(&format!("{scheme}://{host}{port}{GET_INFO_PATH}"))
            .map_err(|e| ProbeError::InvalidTarget(format!("{}: {e}", self.label())))
    }

    pub(crate) fn from_entry(entry: NodeEntry) -> Self {
        let name = entry.bp_name;
        Self {
            port_http: parse_port(&name, "port_http", &entry.port_http),
            port_ssl: parse_port(&name, "port_ssl", &entry.port_ssl),
            port_p2p: parse_port(&name, "port_p2p", &entry.port_p2p),
            coordinates: parse_coordinates(&name, &entry.coordinates),
            organisation: entry.organisation,
            location: entry.location,
            host: entry.node_addr.trim().to_string(),
            latencies: Vec::new(),
            name,
        }
    }

    pub(crate) fn to_entry(&self) -> NodeEntry {
        let port = |p: Option<u16>| p.map(|p| p.to_string()).unwrap_or_default();
        NodeEntry {
            bp_name: self.name.clone(),
            organisation: self.organisation.clone(),
            location: self.location.clone(),
            node_addr: self.host.clone(),
            port_http: port(self.port_http),
            port_ssl: port(self.port_ssl),
            port_p2p: port(self.port_p2p),
            coordinates: self
                .coordinates
                .map(|(lat, lon)| format!("{lat},{lon}"))
                .unwrap_or_default(),
        }
    }
}

fn parse_port(node: &str, field: &str, raw: &str) -> Option<u16> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => {
            warn!(node, field, value = raw, "ignoring invalid port");
            None
        }
        Ok(port) => Some(port),
    }
}

fn parse_coordinates(node: &str, raw: &str) -> Option<(f64, f64)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = raw.split_once(',').and_then(|(lat, lon)| {
        let lat: f64 = lat.trim().parse().ok()?;
        let lon: f64 = lon.trim().parse().ok()?;
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)).then_some((lat, lon))
    });
    if parsed.is_none() {
        warn!(node, value = raw, "ignoring malformed coordinates");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url() {
        let endpoint = Endpoint::new("nodeA", "127.0.0.1", 8888);
        assert_eq!(endpoint.http_url().unwrap().as_str(), "http://127.0.0.1:8888/v1/chain/get_info");
    }

    #[test]
    fn test_http_url_brackets_ipv6() {
        let endpoint = Endpoint::new("v6", "::1", 8888);
        assert_eq!(endpoint.http_url().unwrap().as_str(), "http://[::1]:8888/v1/chain/get_info");
    }

    #[test]
    fn test_http_url_requires_host() {
        let endpoint = Endpoint::new("nodeA", "", 8888);
        assert!(matches!(endpoint.http_url(), Err(ProbeError::InvalidTarget(_))));
    }

    #[test]
    fn test_http_url_without_port_uses_scheme_default() {
        let mut endpoint = Endpoint::new("nodeA", "node.example.org", 8888);
        endpoint.port_http = None;

        let url = endpoint.http_url().unwrap();
        assert_eq!(url.as_str(), "http://node.example.org/v1/chain/get_info");
        assert_eq!(url.port_or_known_default(), Some(80));
    }

    #[test]
    fn test_https_url_only_with_ssl_port() {
        let endpoint = Endpoint::new("nodeA", "node.example.org", 8888);
        assert!(endpoint.https_url().is_none());

        let endpoint = endpoint.with_ssl_port(443);
        let url = endpoint.https_url().unwrap().unwrap();
        // 443 is the scheme default, so the url crate drops it
        assert_eq!(url.as_str(), "https://node.example.org/v1/chain/get_info");
        assert_eq!(url.port_or_known_default(), Some(443));
    }

    #[test]
    fn test_average_latency() {
        let mut endpoint = Endpoint::new("nodeA", "127.0.0.1", 8888);
        assert_eq!(endpoint.average_latency(), None);
        endpoint.record_latency(10.0);
        endpoint.record_latency(30.0);
        assert_eq!(endpoint.latencies(), &[10.0, 30.0]);
        assert_eq!(endpoint.average_latency(), Some(20.0));
    }

    #[test]
    fn test_from_entry_parses_ports_and_coordinates() {
        let entry = NodeEntry {
            bp_name: "nodeA".to_string(),
            node_addr: " 10.0.0.1 ".to_string(),
            port_http: "8888".to_string(),
            port_ssl: "not-a-port".to_string(),
            port_p2p: "9876".to_string(),
            coordinates: "-23.55, -46.63".to_string(),
            ..NodeEntry::default()
        };
        let endpoint = Endpoint::from_entry(entry);
        assert_eq!(endpoint.host, "10.0.0.1");
        assert_eq!(endpoint.port_http, Some(8888));
        assert_eq!(endpoint.port_ssl, None);
        assert_eq!(endpoint.port_p2p, Some(9876));
        assert_eq!(endpoint.coordinates, Some((-23.55, -46.63)));
    }

    #[test]
    fn test_out_of_range_coordinates_are_ignored() {
        assert_eq!(parse_coordinates("n", "91,0"), None);
        assert_eq!(parse_coordinates("n", "north"), None);
    }
}
