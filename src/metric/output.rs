use crate::http::timing::PhaseTimings;
use std::io::Write;
use std::time::Duration;

/// Reported phases, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    DnsLookup,
    TcpConnection,
    TlsHandshake,
    ServerProcessing,
    ContentTransfer,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::DnsLookup,
        Phase::TcpConnection,
        Phase::TlsHandshake,
        Phase::ServerProcessing,
        Phase::ContentTransfer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::DnsLookup => "dnslookup",
            Phase::TcpConnection => "tcpconnection",
            Phase::TlsHandshake => "tlshandshake",
            Phase::ServerProcessing => "serverprocessing",
            Phase::ContentTransfer => "contenttransfer",
        }
    }

    pub fn duration(self, phases: &PhaseTimings) -> Duration {
        match self {
            Phase::DnsLookup => phases.dns_lookup,
            Phase::TcpConnection => phases.tcp_connection,
            Phase::TlsHandshake => phases.tls_handshake,
            Phase::ServerProcessing => phases.server_processing,
            Phase::ContentTransfer => phases.content_transfer,
        }
    }
}

/// `httpstat.<key>.<phase>\t<millis>\t<unix seconds>\n`; millis are truncated.
pub fn format_line(metric_key: &str, phase: Phase, value: Duration, timestamp: i64) -> String {
    format!(
        "httpstat.{}.{}\t{}\t{}\n",
        metric_key,
        phase.name(),
        value.as_millis(),
        timestamp
    )
}

/// Renders all five lines up front and writes them in one go.
pub fn write_metrics<W: Write>(
    out: &mut W,
    metric_key: &str,
    phases: &PhaseTimings,
    timestamp: i64,
) -> std::io::Result<()> {
    let text: String = Phase::ALL
        .iter()
        .map(|&phase| format_line(metric_key, phase, phase.duration(phases), timestamp))
        .collect();
    out.write_all(text.as_bytes())?;
    out.flush()
}
