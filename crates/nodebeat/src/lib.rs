//! Latency probing for blockchain node APIs.
//!
//! A [`NetworkCollection`] of node endpoints is loaded from a JSON file and
//! probed one endpoint per tick by the [`ProbeScheduler`]. Each probe is an
//! instrumented `GET` against the node's status path, timed per phase by the
//! [`LatencyTracer`], and turned into a [`TelemetryRecord`] for a
//! [`TelemetrySink`].

pub mod error;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod sink;
pub mod tracer;

pub use error::{EmitError, LoadError, Phase, ProbeError, ResolveError};
pub use record::{ProbeStatus, TelemetryRecord};
pub use registry::{Endpoint, NetworkCollection};
pub use resolver::{PublicAddressResolver, SourceAddress};
pub use scheduler::{
    CycleReport, ProbeContext, ProbeScheduler, SchedulePolicy, SchedulerState, ShutdownHandle,
    ShutdownSignal, shutdown_channel,
};
pub use sink::{ChannelSink, JsonLinesSink, TelemetrySink};
pub use tracer::{LatencyTracer, PhaseTimings, Prober, TimeoutBudget, TraceOutcome};

/// Node status path probed on every endpoint.
pub const GET_INFO_PATH: &str = "/v1/chain/get_info";
