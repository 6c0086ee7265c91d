//! Probe cycle scheduler.
//!
//! On every tick the next endpoint(s) in round-robin order are probed, the
//! measured latency is appended to that endpoint's history and a telemetry
//! record is handed to the sink. A full pass over `N` endpoints takes `N`
//! ticks when one endpoint is probed per tick.

mod context;
mod cursor;
mod shutdown;

pub use context::ProbeContext;
pub use cursor::RoundRobin;
pub use shutdown::{ShutdownHandle, ShutdownSignal, shutdown_channel};

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::error::ProbeError;
use crate::record::TelemetryRecord;
use crate::registry::NetworkCollection;
use crate::sink::TelemetrySink;
use crate::tracer::TraceOutcome;

/// Smallest accepted tick period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Lifecycle of a [`ProbeScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Probing,
    Stopped,
}

/// How much work a single tick does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Endpoints probed per tick, clamped to the collection size.
    pub probes_per_tick: usize,
    /// Upper bound on probes in flight at once within a tick.
    pub max_concurrent_probes: usize,
    /// Emit a `down` record for failed probes instead of only logging them.
    pub emit_failure_records: bool,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self { probes_per_tick: 1, max_concurrent_probes: 1, emit_failure_records: false }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub probed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub emitted: usize,
    pub emit_errors: usize,
}

/// Drives probe cycles over a [`NetworkCollection`] and feeds a sink.
pub struct ProbeScheduler<S> {
    collection: NetworkCollection,
    cursor: RoundRobin,
    context: ProbeContext,
    policy: SchedulePolicy,
    sink: S,
    state: SchedulerState,
}

impl<S: TelemetrySink> ProbeScheduler<S> {
    /// Create an idle scheduler starting at the first endpoint.
    pub fn new(collection: NetworkCollection, context: ProbeContext, sink: S) -> Self {
        let cursor = RoundRobin::new(collection.len());
        Self {
            collection,
            cursor,
            context,
            policy: SchedulePolicy::default(),
            sink,
            state: SchedulerState::Idle,
        }
    }

    /// Replace the default one-probe-per-tick policy.
    pub fn with_policy(mut self, policy: SchedulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Policy in effect.
    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Endpoints with their latency histories.
    pub fn collection(&self) -> &NetworkCollection {
        &self.collection
    }

    /// Index of the endpoint the next tick starts with.
    pub fn cursor(&self) -> usize {
        self.cursor.position()
    }

    /// Run one probe cycle.
    ///
    /// Latency histories are only touched once every probe of the cycle has
    /// finished, so a tick abandoned mid-flight leaves the collection as it was.
    pub async fn tick(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        if self.state == SchedulerState::Stopped || self.collection.is_empty() {
            return report;
        }
        self.state = SchedulerState::Probing;

        let total = self.collection.len();
        let picks = self.cursor.take(self.policy.probes_per_tick.max(1));
        let jobs: Vec<_> = picks
            .iter()
            .enumerate()
            .filter_map(|(order, &index)| {
                let endpoint = self.collection.get(index)?;
                info!("--------------- {}/{} ---------------", index + 1, total);
                Some((order, index, self.context.target_url(endpoint)))
            })
            .collect();

        let prober = self.context.prober().clone();
        let mut results: Vec<(usize, usize, Result<TraceOutcome, ProbeError>)> = stream::iter(jobs)
            .map(|(order, index, url)| {
                let prober = prober.clone();
                async move {
                    let result = match url {
                        Ok(url) => prober.probe(&url).await,
                        Err(e) => Err(e),
                    };
                    (order, index, result)
                }
            })
            .buffer_unordered(self.policy.max_concurrent_probes.max(1))
            .collect()
            .await;
        results.sort_by_key(|(order, _, _)| *order);

        for (_, index, result) in results {
            let Some(endpoint) = self.collection.get_mut(index) else {
                continue;
            };
            report.probed += 1;

            let record = match result {
                Ok(outcome) => {
                    report.succeeded += 1;
                    endpoint.record_latency(outcome.timings.full);
                    info!("Target: {} | Latency: {:.2} ms", endpoint.host, outcome.timings.full);
                    Some(TelemetryRecord::from_probe(
                        self.context.network(),
                        self.context.source(),
                        endpoint,
                        &outcome,
                    ))
                }
                Err(e) => {
                    report.failed += 1;
                    if e.is_unreachable() {
                        warn!(node = %endpoint.label(), "Server ({}) is down: {}", endpoint.host, e);
                    } else {
                        warn!(node = %endpoint.label(), "Server ({}) answered badly: {}", endpoint.host, e);
                    }
                    self.policy.emit_failure_records.then(|| {
                        TelemetryRecord::failure(
                            self.context.network(),
                            self.context.source(),
                            endpoint,
                            &e,
                        )
                    })
                }
            };

            if let Some(record) = record {
                match self.sink.emit(&record).await {
                    Ok(()) => report.emitted += 1,
                    Err(e) => {
                        report.emit_errors += 1;
                        error!("Failed to emit telemetry for {}: {}", record.target, e);
                    }
                }
            }
        }

        self.state = SchedulerState::Idle;
        debug!(?report, "Probe cycle finished");
        report
    }

    /// Tick every `period` until `shutdown` fires, then close the sink.
    ///
    /// The first cycle starts one period after the call. A probe still in
    /// flight when shutdown arrives is dropped. Returns the collection with
    /// its latency histories.
    pub async fn run(mut self, period: Duration, mut shutdown: ShutdownSignal) -> NetworkCollection {
        let period = period.max(MIN_PERIOD);
        info!(
            network = %self.context.network(),
            nodes = self.collection.len(),
            period_ms = period.as_millis() as u64,
            "Probe loop started"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Shutdown requested, abandoning in-flight probe");
                    break;
                }
                _ = self.tick() => {}
            }
        }

        self.stop().await;
        self.collection
    }

    /// Close the sink and stop accepting ticks. Idempotent.
    pub async fn stop(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        self.state = SchedulerState::Stopped;
        if let Err(e) = self.sink.close().await {
            error!("Failed to close telemetry sink: {}", e);
        }
        info!("Probe loop stopped");
    }
}
