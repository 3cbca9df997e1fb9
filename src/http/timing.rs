use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Receives the phase boundary events of a single HTTP exchange.
///
/// Every method defaults to a no-op so a hook only overrides what it cares about.
pub trait TraceHook: Send + Sync {
    fn on_dns_start(&self) {}
    fn on_dns_done(&self) {}
    fn on_connect_start(&self) {}
    fn on_connect_done(&self) {}
    fn on_tls_start(&self) {}
    fn on_tls_done(&self) {}
    /// Fired after each successful write of the request; the last one wins.
    fn on_wrote_request(&self) {}
    /// Fired once, when the first response byte has been read.
    fn on_first_byte(&self) {}
}

/// Raw timestamps of one exchange. Events that never happened stay `None`.
#[derive(Debug, Default, Clone)]
pub struct RequestTimings {
    pub dns_start: Option<Instant>,
    pub dns_end: Option<Instant>,
    pub tcp_connect_start: Option<Instant>,
    pub tcp_connect_end: Option<Instant>,
    pub tls_start: Option<Instant>,
    pub tls_end: Option<Instant>,
    pub wrote_request: Option<Instant>,
    pub first_byte: Option<Instant>,
}

impl RequestTimings {
    pub fn start_dns(&mut self) {
        self.dns_start = Some(Instant::now());
    }

    pub fn end_dns(&mut self) {
        self.dns_end = Some(Instant::now());
    }

    pub fn start_tcp_connect(&mut self) {
        self.tcp_connect_start = Some(Instant::now());
    }

    pub fn end_tcp_connect(&mut self) {
        self.tcp_connect_end = Some(Instant::now());
    }

    pub fn start_tls(&mut self) {
        self.tls_start = Some(Instant::now());
    }

    pub fn end_tls(&mut self) {
        self.tls_end = Some(Instant::now());
    }

    pub fn mark_wrote_request(&mut self) {
        self.wrote_request = Some(Instant::now());
    }

    pub fn mark_first_byte(&mut self) {
        if self.first_byte.is_none() {
            self.first_byte = Some(Instant::now());
        }
    }

    pub fn dns_duration(&self) -> Option<Duration> {
        span(self.dns_start, self.dns_end)
    }

    pub fn tcp_connect_duration(&self) -> Option<Duration> {
        span(self.tcp_connect_start, self.tcp_connect_end)
    }

    pub fn tls_duration(&self) -> Option<Duration> {
        span(self.tls_start, self.tls_end)
    }

    pub fn server_processing_duration(&self) -> Option<Duration> {
        span(self.wrote_request, self.first_byte)
    }

    pub fn content_transfer_duration(&self, end: Instant) -> Option<Duration> {
        span(self.first_byte, Some(end))
    }

    /// Collapses the timestamps into the five reported phases. `end` must be
    /// taken after the response body has been fully drained.
    pub fn phases(&self, end: Instant) -> PhaseTimings {
        PhaseTimings {
            dns_lookup: self.dns_duration().unwrap_or_default(),
            tcp_connection: self.tcp_connect_duration().unwrap_or_default(),
            tls_handshake: self.tls_duration().unwrap_or_default(),
            server_processing: self.server_processing_duration().unwrap_or_default(),
            content_transfer: self.content_transfer_duration(end).unwrap_or_default(),
        }
    }
}

fn span(start: Option<Instant>, end: Option<Instant>) -> Option<Duration> {
    Some(end?.saturating_duration_since(start?))
}

/// The five durations reported for one request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    pub dns_lookup: Duration,
    pub tcp_connection: Duration,
    pub tls_handshake: Duration,
    pub server_processing: Duration,
    pub content_transfer: Duration,
}

impl fmt::Display for PhaseTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time breakdown:")?;
        writeln!(f, "  DNS lookup:        {:>8} us", self.dns_lookup.as_micros())?;
        writeln!(f, "  TCP connect:       {:>8} us", self.tcp_connection.as_micros())?;
        writeln!(f, "  TLS handshake:     {:>8} us", self.tls_handshake.as_micros())?;
        writeln!(
            f,
            "  Server processing: {:>8} us",
            self.server_processing.as_micros()
        )?;
        write!(
            f,
            "  Content transfer:  {:>8} us",
            self.content_transfer.as_micros()
        )
    }
}

/// [`TraceHook`] that stamps every event into a [`RequestTimings`].
#[derive(Debug, Default)]
pub struct PhaseRecorder {
    timings: Mutex<RequestTimings>,
}

impl PhaseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RequestTimings {
        self.timings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, f: impl FnOnce(&mut RequestTimings)) {
        let mut timings = self.timings.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut timings);
    }
}

impl TraceHook for PhaseRecorder {
    fn on_dns_start(&self) {
        trace!("dns lookup started");
        self.record(RequestTimings::start_dns);
    }

    fn on_dns_done(&self) {
        trace!("dns lookup done");
        self.record(RequestTimings::end_dns);
    }

    fn on_connect_start(&self) {
        trace!("tcp connect started");
        self.record(RequestTimings::start_tcp_connect);
    }

    fn on_connect_done(&self) {
        trace!("tcp connect done");
        self.record(RequestTimings::end_tcp_connect);
    }

    fn on_tls_start(&self) {
        trace!("tls handshake started");
        self.record(RequestTimings::start_tls);
    }

    fn on_tls_done(&self) {
        trace!("tls handshake done");
        self.record(RequestTimings::end_tls);
    }

    fn on_wrote_request(&self) {
        self.record(RequestTimings::mark_wrote_request);
    }

    fn on_first_byte(&self) {
        trace!("first response byte received");
        self.record(RequestTimings::mark_first_byte);
    }
}
