//! Latency tracer.
//!
//! Issues one instrumented `GET /v1/chain/get_info` per probe and splits the
//! elapsed time into DNS, TCP connect, TLS handshake and first-byte phases.
//! The connect, TLS and overall budgets are enforced separately; exceeding
//! any of them fails the probe with [`ProbeError::Timeout`].

mod payload;
mod timings;
mod transport;

pub use payload::HealthPayload;
pub use timings::{PhaseClock, PhaseTimings, TraceEvent};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;

use crate::error::{Phase, ProbeError};
use transport::Target;

/// Time limits for one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutBudget {
    /// DNS resolution plus TCP connect.
    pub connect: Duration,
    pub tls_handshake: Duration,
    /// Everything, including reading the body.
    pub request: Duration,
}

impl Default for TimeoutBudget {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            tls_handshake: Duration::from_secs(2),
            request: Duration::from_secs(5),
        }
    }
}

/// A completed probe: 2xx status and a decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceOutcome {
    pub timings: PhaseTimings,
    pub payload: HealthPayload,
    /// Whether a TLS handshake took place.
    pub tls: bool,
}

/// Something that can probe a node status URL.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<TraceOutcome, ProbeError>;
}

/// The instrumented HTTP prober.
#[derive(Clone)]
pub struct LatencyTracer {
    budget: TimeoutBudget,
    tls: TlsConnector,
}

impl std::fmt::Debug for LatencyTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyTracer").field("budget", &self.budget).finish_non_exhaustive()
    }
}

impl LatencyTracer {
    /// Tracer trusting the webpki root certificates.
    pub fn new(budget: TimeoutBudget) -> Result<Self, ProbeError> {
        Ok(Self::with_tls_config(budget, transport::default_tls_config()?))
    }

    /// Tracer with a caller-supplied TLS client configuration.
    pub fn with_tls_config(budget: TimeoutBudget, config: Arc<rustls::ClientConfig>) -> Self {
        Self { budget, tls: TlsConnector::from(config) }
    }

    pub fn budget(&self) -> TimeoutBudget {
        self.budget
    }

    /// Probe `url` under an explicit budget.
    pub async fn probe_with_budget(
        &self,
        url: &Url,
        budget: TimeoutBudget,
    ) -> Result<TraceOutcome, ProbeError> {
        within(Phase::Request, budget.request, self.trace(url, budget)).await
    }

    async fn trace(&self, url: &Url, budget: TimeoutBudget) -> Result<TraceOutcome, ProbeError> {
        let target = Target::from_url(url)?;
        let mut clock = PhaseClock::start();

        let stream = within(Phase::Connect, budget.connect, async {
            let addrs = transport::resolve(&target, &mut clock).await?;
            transport::connect(&addrs, &mut clock).await
        })
        .await?;

        let body = if target.is_secure() {
            let stream = within(
                Phase::TlsHandshake,
                budget.tls_handshake,
                transport::tls_handshake(&self.tls, &target, stream, &mut clock),
            )
            .await?;
            transport::exchange(stream, url, &target, &mut clock).await?
        } else {
            transport::exchange(stream, url, &target, &mut clock).await?
        };

        let timings = clock.finish();
        let payload = HealthPayload::from_slice(&body)?;

        debug!("DNS Resolution: {:.2} ms", timings.dns);
        debug!("TLS Handshake: {:.2} ms", timings.tls);
        debug!("Connection Time: {:.2} ms", timings.conn);
        debug!("Response Time: {:.2} ms", timings.resp);
        debug!("Client Cost: {:.2} ms", timings.full);

        Ok(TraceOutcome { timings, payload, tls: clock.tls_negotiated() })
    }
}

/// Run `fut` under `budget`, attributing an overrun to `phase`.
async fn within<T>(
    phase: Phase,
    budget: Duration,
    fut: impl Future<Output = Result<T, ProbeError>>,
) -> Result<T, ProbeError> {
    timeout(budget, fut).await.map_err(|_| ProbeError::Timeout { phase, budget })?
}

#[async_trait::async_trait]
impl Prober for LatencyTracer {
    async fn probe(&self, url: &Url) -> Result<TraceOutcome, ProbeError> {
        self.probe_with_budget(url, self.budget).await
    }
}
