use crate::cli::app_config::{normalize_flags, Cli};
use crate::http::handler::{build_request, send_request, RequestBody};
use crate::http::tls::webpki_roots;
use crate::metric::key::resolve_metric_key;
use crate::metric::output::write_metrics;
use anyhow::Context;
use clap::Parser;
use std::ffi::OsString;
use std::io::Write;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;

/// Parses `args`, times one request to the target and writes the metric lines to `out`.
/// Returns the process exit code.
pub async fn run<I, T, W>(args: I, out: &mut W) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    W: Write,
{
    init_tracing();

    let cli = match Cli::try_parse_from(normalize_flags(args)) {
        Ok(cli) => cli,
        Err(e) => {
            // help included: usage goes to stderr and counts as a failed run
            eprint!("{}", e.render());
            return EXIT_ERROR;
        }
    };

    match do_request(cli, out).await {
        Ok(()) => EXIT_OK,
        Err(e) => {
            error!("{:#}", e);
            EXIT_ERROR
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_env_filter(filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn do_request<W: Write>(cli: Cli, out: &mut W) -> Result<(), anyhow::Error> {
    let body = RequestBody::from_flag(cli.body.as_deref());
    let request = build_request(&cli.url, &cli.method, body)?;
    let stat = send_request(request, webpki_roots()).await?;
    debug!(
        "{} answered {} with {} body bytes",
        cli.url, stat.status, stat.body_bytes
    );

    let metric_key = resolve_metric_key(&cli.url, cli.metric_key.as_deref());
    write_metrics(out, &metric_key, &stat.phases, stat.started_at.timestamp())
        .context("Failed to write metrics")?;
    Ok(())
}
