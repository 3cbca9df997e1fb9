use crate::http::timing::TraceHook;
use anyhow::Context;
use std::net::{IpAddr, SocketAddr};

/// Strips the brackets hyper keeps around IPv6 literals.
pub fn bare_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Resolves `host` through the system resolver. IP literals are returned as is
/// and never reach the DNS hooks.
pub async fn resolve(
    host: &str,
    port: u16,
    hook: &dyn TraceHook,
) -> Result<Vec<SocketAddr>, anyhow::Error> {
    let host = bare_host(host);
    if let Ok(ip) = host.parse::<IpAddr>() {
        debug!("Skipping DNS for IP literal {}", ip);
        return Ok(vec![SocketAddr::new(ip, port)]);
    }

    debug!("Resolving DNS for: {}", host);
    hook.on_dns_start();
    let lookup = tokio::net::lookup_host((host, port)).await;
    hook.on_dns_done();

    let addresses: Vec<SocketAddr> = lookup
        .with_context(|| format!("lookup {} failed", host))?
        .collect();
    if addresses.is_empty() {
        debug!("DNS resolution for {} returned no addresses.", host);
        return Err(anyhow!("No IP addresses found for host {}", host));
    }

    for (i, addr) in addresses.iter().enumerate() {
        if i == 0 {
            debug!("Resolved IP: {}", addr.ip());
        } else {
            debug!("Resolved IP (alternative): {}", addr.ip());
        }
    }

    Ok(addresses)
}
