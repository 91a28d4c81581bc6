//! Hostname to IP address resolution.

use std::net::IpAddr;

use hickory_resolver::TokioAsyncResolver;

use crate::error_handling::ProbeError;

/// Resolves a hostname to an IP address using DNS.
///
/// IPv4 answers are preferred because the geolocation lookup and most block
/// lists are keyed on them; an IPv6 answer is returned only when no IPv4
/// address exists.
///
/// # Errors
///
/// Returns `ProbeError::Dns` if resolution fails or no addresses are found.
pub async fn resolve_host_to_ip(
    host: &str,
    resolver: &TokioAsyncResolver,
) -> Result<IpAddr, ProbeError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let response = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| ProbeError::Dns(e.to_string()))?;

    let addresses: Vec<IpAddr> = response.iter().collect();
    addresses
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addresses.first())
        .copied()
        .ok_or_else(|| ProbeError::Dns(format!("no IP addresses found for {host}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::config::{ResolverConfig, ResolverOpts};

    fn create_test_resolver() -> TokioAsyncResolver {
        let mut opts = ResolverOpts::default();
        opts.attempts = 1;
        opts.ndots = 0;
        TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
    }

    #[tokio::test]
    async fn test_ip_literal_skips_lookup() {
        let resolver = create_test_resolver();
        let ip = resolve_host_to_ip("93.184.216.34", &resolver)
            .await
            .expect("literal should resolve");
        assert_eq!(ip, "93.184.216.34".parse::<IpAddr>().expect("valid ip"));
    }

    #[tokio::test]
    async fn test_ipv6_literal_skips_lookup() {
        let resolver = create_test_resolver();
        let ip = resolve_host_to_ip("::1", &resolver)
            .await
            .expect("literal should resolve");
        assert!(ip.is_ipv6());
    }
}
