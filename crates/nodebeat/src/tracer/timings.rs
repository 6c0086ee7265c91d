//! Phase timestamps and the durations derived from them.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Lifecycle hooks of one request, in the order they normally fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    DnsStart,
    DnsDone,
    ConnectStart,
    ConnectDone,
    TlsHandshakeStart,
    TlsHandshakeDone,
    GotConn,
    GotFirstResponseByte,
}

/// Per-phase durations of one probe, in milliseconds.
///
/// Phases that did not happen (no DNS lookup for an IP literal, no TLS on a
/// plain connection) are `0.0`. `full` is measured on its own from the first
/// hook to the response head, so it bounds every other phase rather than
/// being their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseTimings {
    pub dns: f64,
    pub tls: f64,
    pub conn: f64,
    pub resp: f64,
    pub full: f64,
}

impl PhaseTimings {
    /// Longest individual phase.
    pub fn longest_phase(&self) -> f64 {
        self.dns.max(self.tls).max(self.conn).max(self.resp)
    }
}

/// Records an `Instant` for every [`TraceEvent`] as the request progresses.
#[derive(Debug, Clone)]
pub struct PhaseClock {
    start: Instant,
    dns_start: Option<Instant>,
    dns_done: Option<Instant>,
    connect_start: Option<Instant>,
    connect_done: Option<Instant>,
    tls_start: Option<Instant>,
    tls_done: Option<Instant>,
    got_conn: Option<Instant>,
    first_byte: Option<Instant>,
}

impl PhaseClock {
    pub fn start() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            dns_start: None,
            dns_done: None,
            connect_start: None,
            connect_done: None,
            tls_start: None,
            tls_done: None,
            got_conn: None,
            first_byte: None,
        }
    }

    pub fn mark(&mut self, event: TraceEvent) {
        self.mark_at(event, Instant::now());
    }

    /// Later marks of the same event overwrite earlier ones, so a connect
    /// retried against a second address reports the last attempt.
    pub fn mark_at(&mut self, event: TraceEvent, at: Instant) {
        let slot = match event {
            TraceEvent::DnsStart => &mut self.dns_start,
            TraceEvent::DnsDone => &mut self.dns_done,
            TraceEvent::ConnectStart => &mut self.connect_start,
            TraceEvent::ConnectDone => &mut self.connect_done,
            TraceEvent::TlsHandshakeStart => &mut self.tls_start,
            TraceEvent::TlsHandshakeDone => &mut self.tls_done,
            TraceEvent::GotConn => &mut self.got_conn,
            TraceEvent::GotFirstResponseByte => &mut self.first_byte,
        };
        *slot = Some(at);
    }

    pub fn tls_negotiated(&self) -> bool {
        self.tls_done.is_some()
    }

    /// Durations up to the first response byte, or up to `now` when no
    /// response head arrived.
    pub fn finish(&self) -> PhaseTimings {
        let end = self.first_byte.unwrap_or_else(Instant::now);
        PhaseTimings {
            dns: span(self.dns_start, self.dns_done),
            tls: span(self.tls_start, self.tls_done),
            conn: span(self.connect_start, self.connect_done),
            resp: span(self.got_conn, self.first_byte),
            full: millis(end.saturating_duration_since(self.start)),
        }
    }
}

fn span(from: Option<Instant>, to: Option<Instant>) -> f64 {
    match (from, to) {
        (Some(from), Some(to)) => millis(to.saturating_duration_since(from)),
        _ => 0.0,
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_phases_from_marks() {
        let t0 = Instant::now();
        let mut clock = PhaseClock::starting_at(t0);
        clock.mark_at(TraceEvent::DnsStart, t0);
        clock.mark_at(TraceEvent::DnsDone, t0 + ms(4));
        clock.mark_at(TraceEvent::ConnectStart, t0 + ms(4));
        clock.mark_at(TraceEvent::ConnectDone, t0 + ms(10));
        clock.mark_at(TraceEvent::TlsHandshakeStart, t0 + ms(10));
        clock.mark_at(TraceEvent::TlsHandshakeDone, t0 + ms(25));
        clock.mark_at(TraceEvent::GotConn, t0 + ms(25));
        clock.mark_at(TraceEvent::GotFirstResponseByte, t0 + ms(65));

        let timings = clock.finish();
        assert!((timings.dns - 4.0).abs() < 1e-6);
        assert!((timings.conn - 6.0).abs() < 1e-6);
        assert!((timings.tls - 15.0).abs() < 1e-6);
        assert!((timings.resp - 40.0).abs() < 1e-6);
        assert!((timings.full - 65.0).abs() < 1e-6);
        assert!(clock.tls_negotiated());
    }

    #[test]
    fn test_missing_phases_are_zero() {
        let t0 = Instant::now();
        let mut clock = PhaseClock::starting_at(t0);
        clock.mark_at(TraceEvent::ConnectStart, t0);
        clock.mark_at(TraceEvent::ConnectDone, t0 + ms(2));
        clock.mark_at(TraceEvent::GotConn, t0 + ms(2));
        clock.mark_at(TraceEvent::GotFirstResponseByte, t0 + ms(9));

        let timings = clock.finish();
        assert_eq!(timings.dns, 0.0);
        assert_eq!(timings.tls, 0.0);
        assert!(!clock.tls_negotiated());
        assert!(timings.full >= timings.longest_phase());
    }

    #[test]
    fn test_retry_overwrites_connect_marks() {
        let t0 = Instant::now();
        let mut clock = PhaseClock::starting_at(t0);
        clock.mark_at(TraceEvent::ConnectStart, t0);
        clock.mark_at(TraceEvent::ConnectDone, t0 + ms(30));
        clock.mark_at(TraceEvent::ConnectStart, t0 + ms(30));
        clock.mark_at(TraceEvent::ConnectDone, t0 + ms(33));
        clock.mark_at(TraceEvent::GotFirstResponseByte, t0 + ms(40));

        let timings = clock.finish();
        assert!((timings.conn - 3.0).abs() < 1e-6);
        assert!((timings.full - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_order_marks_saturate() {
        let t0 = Instant::now();
        let mut clock = PhaseClock::starting_at(t0 + ms(5));
        clock.mark_at(TraceEvent::DnsStart, t0 + ms(5));
        clock.mark_at(TraceEvent::DnsDone, t0);
        clock.mark_at(TraceEvent::GotFirstResponseByte, t0);

        let timings = clock.finish();
        assert_eq!(timings.dns, 0.0);
        assert_eq!(timings.full, 0.0);
    }
}
