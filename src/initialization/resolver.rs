//! DNS resolver initialization.

use std::net::IpAddr;
use std::sync::Arc;

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

use crate::config::{Config, DNS_ANSWER_CACHE_SIZE, DNS_ANSWER_MAX_TTL};
use crate::error_handling::InitializationError;

/// Initializes the DNS resolver for the configured name servers.
///
/// Queries go over plain UDP/TCP port 53 to every server in
/// `network.dns_servers`. The per-query timeout follows `network.timeout` and
/// the resolver's own answer cache is kept small and short-lived because the
/// checker keeps a DNS cache of its own.
///
/// # Errors
///
/// Returns `InitializationError::DnsResolverError` if no configured server is
/// a valid IP address.
pub fn init_resolver(config: &Config) -> Result<Arc<TokioAsyncResolver>, InitializationError> {
    let servers: Vec<IpAddr> = config
        .network
        .dns_servers
        .iter()
        .filter_map(|server| server.trim().parse().ok())
        .collect();
    if servers.is_empty() {
        return Err(InitializationError::DnsResolverError(format!(
            "no usable DNS server in {:?}",
            config.network.dns_servers
        )));
    }

    let group = NameServerConfigGroup::from_ips_clear(&servers, 53, true);
    let resolver_config = ResolverConfig::from_parts(None, vec![], group);

    let mut opts = ResolverOpts::default();
    opts.timeout = config.network.timeout;
    opts.attempts = 2;
    // No search-domain appending
    opts.ndots = 0;
    opts.cache_size = DNS_ANSWER_CACHE_SIZE;
    opts.positive_max_ttl = Some(DNS_ANSWER_MAX_TTL);

    Ok(Arc::new(TokioAsyncResolver::tokio(resolver_config, opts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_resolver_with_defaults() {
        assert!(init_resolver(&Config::default()).is_ok());
    }

    #[tokio::test]
    async fn test_init_resolver_rejects_unusable_servers() {
        let mut config = Config::default();
        config.network.dns_servers = vec!["dns.example".to_string()];
        let err = init_resolver(&config).unwrap_err();
        assert!(err.to_string().contains("no usable DNS server"));
    }
}
