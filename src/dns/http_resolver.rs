//! hickory-backed DNS resolver for reqwest.
//!
//! Implements `reqwest::dns::Resolve` on top of the shared
//! `TokioAsyncResolver`, so page fetches and geolocation requests query the
//! configured name servers instead of the system resolver.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hickory_resolver::TokioAsyncResolver;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// reqwest resolver delegating to the checker's hickory resolver.
///
/// IPv4 addresses are returned first, matching the address the resolution
/// stage hands to the location and TLS stages.
#[derive(Clone)]
pub struct HickoryResolve {
    resolver: Arc<TokioAsyncResolver>,
}

impl HickoryResolve {
    pub fn new(resolver: Arc<TokioAsyncResolver>) -> Self {
        Self { resolver }
    }
}

/// Moves IPv4 addresses ahead of IPv6, keeping resolver order within each family.
fn ipv4_first(mut ips: Vec<IpAddr>) -> Vec<IpAddr> {
    ips.sort_by_key(|ip| !ip.is_ipv4());
    ips
}

impl Resolve for HickoryResolve {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let host = name.as_str();
            let ips: Vec<IpAddr> = match host.parse::<IpAddr>() {
                Ok(ip) => vec![ip],
                Err(_) => resolver
                    .lookup_ip(host)
                    .await
                    .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })?
                    .iter()
                    .collect(),
            };
            // reqwest fills in the port from the URL
            let addrs: Addrs = Box::new(
                ipv4_first(ips)
                    .into_iter()
                    .map(|ip| SocketAddr::new(ip, 0)),
            );
            Ok(addrs)
        })
    }
}
