use std::sync::Arc;

use url::Url;

use crate::error::ProbeError;
use crate::registry::Endpoint;
use crate::tracer::Prober;

/// Run-wide values every probe cycle needs, built once at startup.
#[derive(Clone)]
pub struct ProbeContext {
    prober: Arc<dyn Prober>,
    network: String,
    source: String,
    use_tls: bool,
}

impl ProbeContext {
    pub fn new(
        prober: Arc<dyn Prober>,
        network: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self { prober, network: network.into(), source: source.into(), use_tls: false }
    }

    /// Probe the TLS port where a node has one.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn prober(&self) -> &Arc<dyn Prober> {
        &self.prober
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Status URL for `endpoint`. With TLS enabled, nodes without a TLS port
    /// are still probed over plain HTTP.
    pub fn target_url(&self, endpoint: &Endpoint) -> Result<Url, ProbeError> {
        if self.use_tls {
            if let Some(url) = endpoint.https_url() {
                return url;
            }
        }
        endpoint.http_url()
    }
}

impl std::fmt::Debug for ProbeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeContext")
            .field("network", &self.network)
            .field("source", &self.source)
            .field("use_tls", &self.use_tls)
            .finish_non_exhaustive()
    }
}
