use clap::Parser;
use std::ffi::OsString;

#[derive(Parser, Debug)]
#[command(
    name = "mackerel-plugin-httpstat",
    author,
    about = "Time the phases of one HTTP request and print them as metric lines"
)]
pub struct Cli {
    /// target URL
    #[arg(long, value_name = "url", default_value = "", allow_hyphen_values = true)]
    pub url: String,
    /// http method
    #[arg(
        long,
        value_name = "method",
        default_value = "GET",
        allow_hyphen_values = true
    )]
    pub method: String,
    /// request body(optional). Only its presence matters: an empty payload is sent.
    #[arg(long, value_name = "body", allow_hyphen_values = true)]
    pub body: Option<String>,
    /// metric key (generated from url by default)
    #[arg(long = "metric-key", value_name = "key", allow_hyphen_values = true)]
    pub metric_key: Option<String>,
    /// Flag parsing stops at the first positional argument; it and everything
    /// after it are accepted and ignored.
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub ignored: Vec<String>,
}

const VALUE_FLAGS: [&str; 4] = ["url", "method", "body", "metric-key"];
const SWITCH_FLAGS: [&str; 1] = ["help"];

/// Rewrites single-dash long flags (`-url=x`, `-metric-key x`) into the
/// double-dash form clap understands. Values following a flag are left alone,
/// and so is everything from the first positional argument on.
pub fn normalize_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut normalized = Vec::new();
    let mut value_next = false;
    let mut passthrough = false;

    for (i, arg) in args.into_iter().map(Into::into).enumerate() {
        if i == 0 || value_next || passthrough {
            value_next = false;
            normalized.push(arg);
            continue;
        }
        let Some(text) = arg.to_str() else {
            normalized.push(arg);
            continue;
        };
        if text == "--" {
            passthrough = true;
            normalized.push(arg);
            continue;
        }

        let long = match text.strip_prefix("--") {
            Some(rest) => Some(rest),
            None => text.strip_prefix('-'),
        };
        let Some(long) = long.filter(|l| !l.is_empty()) else {
            passthrough = true;
            normalized.push(arg);
            continue;
        };
        let (name, has_value) = match long.split_once('=') {
            Some((name, _)) => (name, true),
            None => (long, false),
        };

        if VALUE_FLAGS.contains(&name) {
            value_next = !has_value;
            normalized.push(OsString::from(format!("--{}", long)));
        } else if SWITCH_FLAGS.contains(&name) {
            normalized.push(OsString::from(format!("--{}", long)));
        } else {
            normalized.push(arg);
        }
    }
    normalized
}
